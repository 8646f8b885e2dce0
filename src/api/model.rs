use serde::Serialize;

#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub(super) struct NegotiateResponse {
    pub domain_filter: Vec<String>,
}
