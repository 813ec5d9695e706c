use surrealdb::{engine::any::Any, Surreal};

/// Index-time schema the adapter assumes already exists (§1 Non-goals: graph
/// construction is out of scope). Exposed so test harnesses and local
/// development can stand up an in-memory instance that matches it.
pub async fn ensure_indexes(db: &Surreal<Any>, embedding_dim: usize) -> surrealdb::Result<()> {
    db.query(format!(
        "DEFINE INDEX IF NOT EXISTS idx_chunk_embedding ON text_chunk FIELDS embedding HNSW DIMENSION {embedding_dim};
         DEFINE INDEX IF NOT EXISTS idx_sentence_embedding ON sentence FIELDS embedding HNSW DIMENSION {embedding_dim};
         DEFINE INDEX IF NOT EXISTS idx_entity_embedding ON entity FIELDS embedding HNSW DIMENSION {embedding_dim};
         DEFINE INDEX IF NOT EXISTS idx_community_embedding ON community FIELDS summary_embedding HNSW DIMENSION {embedding_dim};
         DEFINE ANALYZER IF NOT EXISTS engine_analyzer TOKENIZERS blank,class FILTERS lowercase,snowball(english);
         DEFINE INDEX IF NOT EXISTS idx_chunk_fts ON text_chunk FIELDS text SEARCH ANALYZER engine_analyzer BM25;
         DEFINE INDEX IF NOT EXISTS idx_entity_name ON entity FIELDS name;
         DEFINE INDEX IF NOT EXISTS idx_entity_community ON entity FIELDS community_id;"
    ))
    .await?;
    Ok(())
}
