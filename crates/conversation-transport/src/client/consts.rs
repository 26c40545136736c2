pub const TRANSPORT_URL: &str = "TRANSPORT_URL";
pub const TRANSPORT_API_KEY: &str = "TRANSPORT_API_KEY";

pub const AUTHORIZATION_HEADER: &str = "Authorization";
pub const CONVERSATION_QUERY_PARAM: &str = "conversation_id";
