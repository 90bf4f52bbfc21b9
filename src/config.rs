use std::env;
use std::fs;
use std::path::PathBuf;

/// Filesystem locations owned by the process (logs, local databases).
#[derive(Debug, Clone)]
pub struct AppPaths {
    pub data_dir: PathBuf,
    pub log_dir: PathBuf,
    pub vector_db_path: PathBuf,
}

impl AppPaths {
    pub fn new() -> Self {
        let data_dir = env::var("ASKPDF_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("data"));
        let log_dir = data_dir.join("logs");
        let vector_db_path = data_dir.join("vectors.db");

        for dir in [&data_dir, &log_dir] {
            let _ = fs::create_dir_all(dir);
        }

        AppPaths {
            data_dir,
            log_dir,
            vector_db_path,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

/// Process configuration, resolved once at startup from the environment.
#[derive(Debug, Clone)]
pub struct Settings {
    pub aws_region: String,
    pub bucket_name: String,
    /// Work queue carrying `{doc_id, key}` ingestion tasks.
    pub ingest_queue_url: String,
    /// Status channel carrying terminal ingestion outcomes.
    pub status_queue_url: String,
    pub gemini_api_key: String,
    /// Model used for grounded answers.
    pub model_lg: String,
    /// Small model used for best-effort title generation.
    pub model_sm: String,
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Settings {
            aws_region: require("AWS_REGION")?,
            bucket_name: require("BUCKET_NAME")?,
            ingest_queue_url: require("INGEST_QUEUE_URL")?,
            status_queue_url: require("STATUS_QUEUE_URL")?,
            gemini_api_key: require("GEMINI_API_KEY")?,
            model_lg: env::var("LLM_MODEL_LG").unwrap_or_else(|_| "gemini-2.0-flash".to_string()),
            model_sm: env::var("LLM_MODEL_SM")
                .unwrap_or_else(|_| "gemini-2.0-flash-lite".to_string()),
        })
    }
}

fn require(name: &str) -> anyhow::Result<String> {
    env::var(name).map_err(|_| anyhow::anyhow!("{} environment variable not set", name))
}
