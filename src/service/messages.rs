// messages.rs — Activation wire format
//
// One JSON object per connection in each direction. Byte fields travel as
// standard base64 strings. A refusal carries only the coarse error kind and
// its public message. Field names are camelCase on the wire.

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::coordinator::{Activation, ActivationRequest};
use crate::error::{AdmissionError, ErrorKind, ServiceError};
use crate::manifest::Parameters;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivationRequestMsg {
    pub marble_type: String,
    pub public_key: String,
    pub quote: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub infrastructure: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub common_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ActivationResponseMsg {
    Ok {
        certificate: String,
        root_ca: String,
        common_name: String,
        files: BTreeMap<String, String>,
        env: BTreeMap<String, String>,
        argv: Vec<String>,
    },
    Error {
        error_kind: ErrorKind,
        message: String,
    },
}

/// Certificate material and parameters handed to an admitted marble.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationGrant {
    pub certificate: Vec<u8>,
    pub root_ca: Vec<u8>,
    pub common_name: String,
    pub parameters: Parameters,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivationReply {
    Granted(ActivationGrant),
    Refused { kind: ErrorKind, message: String },
}

fn decode(field: &'static str, value: &str) -> Result<Vec<u8>, ServiceError> {
    STANDARD
        .decode(value)
        .map_err(|_| ServiceError::Base64 { field })
}

impl From<&ActivationRequest> for ActivationRequestMsg {
    fn from(req: &ActivationRequest) -> Self {
        Self {
            marble_type: req.marble_type.clone(),
            public_key: STANDARD.encode(&req.public_key),
            quote: STANDARD.encode(&req.quote),
            infrastructure: req.infrastructure.clone(),
            common_name: req.requested_common_name.clone(),
        }
    }
}

impl ActivationRequestMsg {
    pub fn into_request(self) -> Result<ActivationRequest, ServiceError> {
        Ok(ActivationRequest {
            public_key: decode("publicKey", &self.public_key)?,
            quote: decode("quote", &self.quote)?,
            marble_type: self.marble_type,
            infrastructure: self.infrastructure,
            requested_common_name: self.common_name,
        })
    }
}

impl ActivationResponseMsg {
    pub fn refusal(kind: ErrorKind) -> Self {
        Self::Error {
            error_kind: kind,
            message: kind.public_message().to_string(),
        }
    }

    /// Wire form of an engine result. Errors are reduced to their kind.
    pub fn from_result(result: &Result<Activation, AdmissionError>) -> Self {
        match result {
            Ok(activation) => {
                let params = &activation.parameters;
                Self::Ok {
                    certificate: STANDARD.encode(&activation.certificate.der),
                    root_ca: STANDARD.encode(&activation.root_certificate),
                    common_name: activation.certificate.common_name.clone(),
                    files: params
                        .files
                        .iter()
                        .map(|(path, data)| (path.clone(), STANDARD.encode(data)))
                        .collect(),
                    env: params.env.clone(),
                    argv: params.argv.clone(),
                }
            }
            Err(e) => Self::refusal(e.kind()),
        }
    }

    pub fn into_reply(self) -> Result<ActivationReply, ServiceError> {
        match self {
            Self::Ok {
                certificate,
                root_ca,
                common_name,
                files,
                env,
                argv,
            } => {
                let files = files
                    .into_iter()
                    .map(|(path, data)| Ok((path, decode("files", &data)?)))
                    .collect::<Result<_, ServiceError>>()?;
                Ok(ActivationReply::Granted(ActivationGrant {
                    certificate: decode("certificate", &certificate)?,
                    root_ca: decode("rootCa", &root_ca)?,
                    common_name,
                    parameters: Parameters { files, env, argv },
                }))
            }
            Self::Error {
                error_kind,
                message,
            } => Ok(ActivationReply::Refused {
                kind: error_kind,
                message,
            }),
        }
    }
}
