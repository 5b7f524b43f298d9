use serde::Serialize;

/// Outcome of one client within a bulk generation run.
#[derive(Debug, Clone, Serialize)]
pub struct BulkGenerationItem {
    pub client_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub letter_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BulkGenerationItem {
    pub fn success(client_id: String, client_name: String, letter_id: String) -> Self {
        Self {
            client_id,
            client_name: Some(client_name),
            letter_id: Some(letter_id),
            error: None,
        }
    }

    pub fn failure(client_id: String, error: String) -> Self {
        Self {
            client_id,
            client_name: None,
            letter_id: None,
            error: Some(error),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Write-once summary of a bulk generation run.
#[derive(Debug, Clone, Serialize)]
pub struct BulkGenerationResult {
    pub total_requested: usize,
    pub success_count: usize,
    pub failure_count: usize,
    pub results: Vec<BulkGenerationItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zip_file_id: Option<String>,
    pub summary: String,
}

impl BulkGenerationResult {
    /// Derives every count and the summary string from the accumulated
    /// results alone, so `success_count + failure_count == total_requested
    /// == results.len()` holds by construction.
    pub fn from_results(results: Vec<BulkGenerationItem>, zip_file_id: Option<String>) -> Self {
        let success_count = results.iter().filter(|r| r.succeeded()).count();
        let failure_count = results.len() - success_count;
        let summary = format!(
            "Generated {} of {} letters ({} failed)",
            success_count,
            results.len(),
            failure_count
        );
        Self {
            total_requested: results.len(),
            success_count,
            failure_count,
            results,
            zip_file_id,
            summary,
        }
    }
}
