//! `colloquy rerank`. Order documents by relevance to a query.

use colloquy_config::AppConfig;
use colloquy_providers::CohereClient;

pub async fn run(
    query: &str,
    documents: &[String],
    top_n: Option<usize>,
    model: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let client = CohereClient::from_config(&config).await?;

    let reply = client.rerank(query, documents, top_n, model).await?;
    for (rank, result) in reply.results.iter().enumerate() {
        let text = documents.get(result.index).map_or("?", String::as_str);
        println!("{:>2}. [{:.3}] {text}", rank + 1, result.relevance_score);
    }
    Ok(())
}
