use async_trait::async_trait;
use scene_types::PersonSpan;
use serde::{Deserialize, Serialize};

use super::SpanExtractor;
use crate::error::ExtractError;

/// Entity label kept from the service's output.
const PERSON_LABEL: &str = "PERSON";

#[derive(Debug, Serialize)]
struct NerRequest<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct NerResponse {
    #[serde(default)]
    entities: Vec<NerEntity>,
}

/// One labelled span as reported by the service (character offsets).
#[derive(Debug, Deserialize)]
struct NerEntity {
    text: String,
    label: String,
    start_char: usize,
    end_char: usize,
}

/// Span backend backed by an external named-entity-recognition service.
///
/// The model lives elsewhere; this client only sends scene text and keeps
/// the `PERSON` entities, in the order the service returned them.
pub struct NerServiceExtractor {
    client: reqwest::Client,
    endpoint: String,
}

impl NerServiceExtractor {
    pub fn new(endpoint: &str) -> Result<Self, ExtractError> {
        let url = reqwest::Url::parse(endpoint)
            .map_err(|e| ExtractError::Config(format!("Invalid NER endpoint '{endpoint}': {e}")))?;
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| ExtractError::Config(e.to_string()))?;
        Ok(NerServiceExtractor {
            client,
            endpoint: url.to_string(),
        })
    }
}

fn person_spans(response: NerResponse) -> Vec<PersonSpan> {
    response
        .entities
        .into_iter()
        .filter(|e| e.label == PERSON_LABEL)
        .map(|e| PersonSpan {
            name: e.text,
            start: e.start_char,
            end: e.end_char,
        })
        .collect()
}

#[async_trait]
impl SpanExtractor for NerServiceExtractor {
    fn backend_id(&self) -> &str {
        "ner-service"
    }

    async fn extract_spans(&self, text: &str) -> Result<Vec<PersonSpan>, ExtractError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&NerRequest { text })
            .send()
            .await
            .map_err(|e| ExtractError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(ExtractError::Api { status, message });
        }

        let body: NerResponse = response
            .json()
            .await
            .map_err(|e| ExtractError::Parse(e.to_string()))?;
        let spans = person_spans(body);
        tracing::debug!(persons = spans.len(), "ner service replied");
        Ok(spans)
    }
}
