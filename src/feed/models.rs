use serde::Deserialize;
use serde_json::Value;

// {
//   "servers": [
//     { "ip": "1.2.3.4", "name": "...", "start": "DD/MM/YYYY", "end": "DD/MM/YYYY" }
//   ]
// }

#[derive(Debug, Deserialize)]
pub struct FeedPayload {
    #[serde(default)]
    pub servers: Vec<Value>,
}

/// A single server record. Every field is optional on the wire; records are
/// decoded one at a time so a single bad element does not sink the payload.
#[derive(Debug, Default, Deserialize)]
pub struct RawServer {
    pub ip: Option<String>,
    pub name: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
}
