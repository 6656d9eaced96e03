use rusqlite::Transaction;

use crate::error::Result;

/// A single idempotent schema step. `up` receives the profile's table
/// prefix (`""` for the default profile, `"{profile}_"` otherwise) since
/// table names can't be bound as SQL parameters.
pub struct Migration {
    pub id: i64,
    pub up: fn(&Transaction, &str) -> Result<()>,
}

pub fn all() -> Vec<Migration> {
    vec![
        Migration { id: 1, up: create_base_schema },
        Migration { id: 2, up: create_key_value_table },
        Migration { id: 3, up: add_entity_name_key },
    ]
}

fn create_base_schema(tx: &Transaction, prefix: &str) -> Result<()> {
    let sql = format!(
        "
        CREATE TABLE IF NOT EXISTS {p}sessions (
            id TEXT PRIMARY KEY,
            started_at INTEGER NOT NULL,
            ended_at INTEGER,
            unit_count INTEGER NOT NULL DEFAULT 0,
            summary TEXT,
            mood_trajectory TEXT
        );

        CREATE TABLE IF NOT EXISTS {p}conversation_units (
            id TEXT PRIMARY KEY,
            session_id TEXT NOT NULL,
            timestamp INTEGER NOT NULL,
            raw_text TEXT NOT NULL,
            sanitized_text TEXT NOT NULL,
            source TEXT NOT NULL,
            speaker TEXT NOT NULL,
            discourse_function TEXT NOT NULL,
            preceding_context_summary TEXT,
            created_at INTEGER NOT NULL,
            processed INTEGER NOT NULL DEFAULT 0
        );
        CREATE INDEX IF NOT EXISTS idx_{p}units_session ON {p}conversation_units(session_id);
        CREATE INDEX IF NOT EXISTS idx_{p}units_processed ON {p}conversation_units(processed);

        CREATE TABLE IF NOT EXISTS {p}propositions (
            id TEXT PRIMARY KEY,
            unit_id TEXT NOT NULL,
            tokens TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS {p}stances (
            id TEXT PRIMARY KEY,
            proposition_id TEXT NOT NULL,
            attitude TEXT NOT NULL,
            intensity REAL NOT NULL
        );

        CREATE TABLE IF NOT EXISTS {p}spans (
            id TEXT PRIMARY KEY,
            unit_id TEXT NOT NULL,
            char_start INTEGER NOT NULL,
            char_end INTEGER NOT NULL,
            text TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS {p}entity_mentions (
            id TEXT PRIMARY KEY,
            entity_id TEXT NOT NULL,
            span_id TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS {p}entities (
            id TEXT PRIMARY KEY,
            canonical_name TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            aliases TEXT NOT NULL DEFAULT '[]',
            mention_count INTEGER NOT NULL DEFAULT 0,
            first_mentioned INTEGER NOT NULL,
            last_referenced INTEGER NOT NULL
        );
        CREATE UNIQUE INDEX IF NOT EXISTS idx_{p}entities_name
            ON {p}entities(canonical_name, entity_type);

        CREATE TABLE IF NOT EXISTS {p}claims (
            id TEXT PRIMARY KEY,
            statement TEXT NOT NULL,
            subject TEXT NOT NULL,
            claim_type TEXT NOT NULL,
            temporality TEXT NOT NULL,
            abstraction TEXT NOT NULL,
            source_type TEXT NOT NULL,
            initial_confidence REAL NOT NULL,
            current_confidence REAL NOT NULL,
            state TEXT NOT NULL,
            emotional_valence REAL NOT NULL DEFAULT 0,
            emotional_intensity REAL NOT NULL DEFAULT 0,
            stakes TEXT NOT NULL,
            valid_from INTEGER NOT NULL,
            valid_until INTEGER,
            created_at INTEGER NOT NULL,
            last_confirmed INTEGER NOT NULL,
            confirmation_count INTEGER NOT NULL DEFAULT 1,
            extraction_program_id TEXT NOT NULL,
            superseded_by TEXT,
            elaborates TEXT,
            memory_tier TEXT NOT NULL DEFAULT 'working',
            salience REAL NOT NULL DEFAULT 0,
            promoted_at INTEGER,
            last_accessed INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_{p}claims_state ON {p}claims(state);
        CREATE INDEX IF NOT EXISTS idx_{p}claims_subject ON {p}claims(subject);
        CREATE INDEX IF NOT EXISTS idx_{p}claims_tier ON {p}claims(memory_tier);

        CREATE TABLE IF NOT EXISTS {p}claim_sources (
            claim_id TEXT NOT NULL,
            unit_id TEXT NOT NULL,
            PRIMARY KEY (claim_id, unit_id)
        );

        CREATE TABLE IF NOT EXISTS {p}goals (
            id TEXT PRIMARY KEY,
            statement TEXT NOT NULL,
            goal_type TEXT NOT NULL,
            timeframe TEXT NOT NULL,
            status TEXT NOT NULL,
            parent_goal_id TEXT,
            created_at INTEGER NOT NULL,
            last_referenced INTEGER NOT NULL,
            priority INTEGER NOT NULL DEFAULT 3,
            progress_type TEXT NOT NULL,
            progress_value REAL NOT NULL DEFAULT 0,
            milestones TEXT NOT NULL DEFAULT '[]',
            blockers TEXT NOT NULL DEFAULT '[]',
            source_claim_id TEXT NOT NULL,
            motivation TEXT,
            deadline INTEGER
        );
        CREATE INDEX IF NOT EXISTS idx_{p}goals_parent ON {p}goals(parent_goal_id);
        CREATE INDEX IF NOT EXISTS idx_{p}goals_status ON {p}goals(status);

        CREATE TABLE IF NOT EXISTS {p}goal_progress_updates (
            id TEXT PRIMARY KEY,
            goal_id TEXT NOT NULL,
            value REAL NOT NULL,
            reason TEXT NOT NULL,
            evidence_claim_id TEXT,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_{p}goal_progress_goal ON {p}goal_progress_updates(goal_id);

        CREATE TABLE IF NOT EXISTS {p}corrections (
            id TEXT PRIMARY KEY,
            wrong_text TEXT NOT NULL,
            correct_text TEXT NOT NULL,
            original_case TEXT NOT NULL,
            usage_count INTEGER NOT NULL DEFAULT 1,
            created_at INTEGER NOT NULL,
            last_used INTEGER NOT NULL,
            source_unit_id TEXT
        );
        CREATE UNIQUE INDEX IF NOT EXISTS idx_{p}corrections_wrong
            ON {p}corrections(wrong_text);

        CREATE TABLE IF NOT EXISTS {p}vocabulary (
            id TEXT PRIMARY KEY,
            correct_spelling TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            context_hints TEXT NOT NULL DEFAULT '[]',
            phonetic_primary TEXT NOT NULL,
            phonetic_secondary TEXT,
            usage_count INTEGER NOT NULL DEFAULT 0,
            variant_counts TEXT NOT NULL DEFAULT '{{}}'
        );
        CREATE INDEX IF NOT EXISTS idx_{p}vocabulary_phonetic
            ON {p}vocabulary(phonetic_primary);

        CREATE TABLE IF NOT EXISTS {p}tasks (
            id TEXT PRIMARY KEY,
            task_type TEXT NOT NULL,
            payload TEXT NOT NULL,
            status TEXT NOT NULL,
            priority TEXT NOT NULL,
            priority_value INTEGER NOT NULL,
            attempts INTEGER NOT NULL DEFAULT 0,
            max_attempts INTEGER NOT NULL,
            last_error TEXT,
            next_retry_at INTEGER,
            backoff_config TEXT NOT NULL,
            checkpoint TEXT,
            created_at INTEGER NOT NULL,
            started_at INTEGER,
            completed_at INTEGER,
            execute_at INTEGER NOT NULL,
            group_id TEXT,
            depends_on TEXT,
            session_id TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_{p}tasks_status ON {p}tasks(status, priority_value DESC, execute_at);

        CREATE TABLE IF NOT EXISTS {p}observer_outputs (
            id TEXT PRIMARY KEY,
            observer_name TEXT NOT NULL,
            kind TEXT NOT NULL,
            content TEXT NOT NULL,
            source_claim_ids TEXT NOT NULL DEFAULT '[]',
            created_at INTEGER NOT NULL,
            stale INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS {p}contradictions (
            id TEXT PRIMARY KEY,
            claim_a_id TEXT NOT NULL,
            claim_b_id TEXT NOT NULL,
            explanation TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            stale INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS {p}patterns (
            id TEXT PRIMARY KEY,
            description TEXT NOT NULL,
            source_claim_ids TEXT NOT NULL DEFAULT '[]',
            created_at INTEGER NOT NULL,
            stale INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS {p}observed_values (
            id TEXT PRIMARY KEY,
            statement TEXT NOT NULL,
            source_claim_ids TEXT NOT NULL DEFAULT '[]',
            created_at INTEGER NOT NULL,
            stale INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS {p}extraction_programs (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            version TEXT NOT NULL,
            active INTEGER NOT NULL DEFAULT 1
        );

        CREATE TABLE IF NOT EXISTS {p}observer_programs (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            success_rate REAL NOT NULL DEFAULT 0,
            active INTEGER NOT NULL DEFAULT 1
        );

        CREATE TABLE IF NOT EXISTS {p}synthesis_cache (
            id TEXT PRIMARY KEY,
            synthesis_type TEXT NOT NULL,
            cache_key TEXT NOT NULL,
            content TEXT NOT NULL,
            source_claims TEXT NOT NULL DEFAULT '[]',
            created_at INTEGER NOT NULL,
            stale INTEGER NOT NULL DEFAULT 0,
            ttl_seconds INTEGER NOT NULL
        );
        CREATE UNIQUE INDEX IF NOT EXISTS idx_{p}synthesis_key
            ON {p}synthesis_cache(synthesis_type, cache_key);
        ",
        p = prefix,
    );

    tx.execute_batch(&sql)?;
    Ok(())
}

/// Generic key/value storage backing the debug facade's `getData` /
/// `setData` / `deleteData` trio.
fn create_key_value_table(tx: &Transaction, prefix: &str) -> Result<()> {
    let sql = format!(
        "
        CREATE TABLE IF NOT EXISTS {p}key_value (
            key TEXT PRIMARY KEY,
            value_type TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at INTEGER NOT NULL
        );
        ",
        p = prefix,
    );
    tx.execute_batch(&sql)?;
    Ok(())
}

/// Backs entity name-uniqueness with a trimmed, lowercased key instead of
/// SQLite's default case-sensitive BINARY collation, so "Alice" and "alice"
/// resolve to the same row.
fn add_entity_name_key(tx: &Transaction, prefix: &str) -> Result<()> {
    let sql = format!(
        "
        DROP INDEX IF EXISTS idx_{p}entities_name;
        ALTER TABLE {p}entities ADD COLUMN name_key TEXT GENERATED ALWAYS AS
            (lower(trim(canonical_name))) STORED;
        CREATE UNIQUE INDEX IF NOT EXISTS idx_{p}entities_name_key
            ON {p}entities(name_key, entity_type);
        ",
        p = prefix,
    );
    tx.execute_batch(&sql)?;
    Ok(())
}
