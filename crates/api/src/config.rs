/// Runtime configuration, read from the environment with defaults matching
/// the reference deployment. Secret loading (dotenv and friends) happens
/// upstream of this process.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub neo4j_uri: String,
    pub neo4j_user: String,
    pub neo4j_password: String,

    pub cohere_base_url: String,
    pub cohere_api_key: String,
    pub chat_model: String,
    pub embed_model: String,

    pub bind_addr: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            neo4j_uri: var("NEO4J_URI", "bolt://localhost:7687"),
            neo4j_user: var("NEO4J_USERNAME", "neo4j"),
            neo4j_password: var("NEO4J_PASSWORD", "neo4j"),
            cohere_base_url: var("COHERE_BASE_URL", "https://api.cohere.ai"),
            cohere_api_key: var("COHERE_API_KEY", ""),
            chat_model: var("CHAT_MODEL", "command-a-03-2025"),
            embed_model: var("EMBED_MODEL", "embed-english-v3.0"),
            bind_addr: var("BIND_ADDR", "0.0.0.0:3000"),
        }
    }
}

fn var(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
