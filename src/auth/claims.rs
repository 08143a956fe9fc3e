use serde::{Deserialize, Serialize};

/// Audience is a single string or an array of strings on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Audience {
    One(String),
    Many(Vec<String>),
}

impl Audience {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            Audience::One(a) => vec![a],
            Audience::Many(a) => a,
        }
    }
}

/// Registered JWT claims carried by an access token.
///
/// Every field is optional when decoding so that an absent claim can be
/// reported by name instead of as a generic JSON error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>, // expires at (unix timestamp)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>, // not before
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>, // issued at
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aud: Option<Audience>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>, // user ID as decimal string
}
