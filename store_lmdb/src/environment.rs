//! LMDB environment setup: one database per table plus secondary indexes.

use std::path::Path;

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};
use serde::de::DeserializeOwned;
use serde::Serialize;

use ccn_types::ErrorCode;

use crate::LmdbError;

/// Current on-disk schema version. Bumped on any incompatible layout change.
const SCHEMA_VERSION: u64 = 1;

const META_SCHEMA_VERSION: &[u8] = b"schema_version";
pub(crate) const META_CREDIT_SEQ: &[u8] = b"credit_seq";

/// The LMDB-backed store: owns the environment and every database handle.
pub struct LmdbStore {
    pub(crate) env: Env,

    pub(crate) messages_db: Database<Bytes, Bytes>,
    pub(crate) rejections_db: Database<Bytes, Bytes>,
    pub(crate) claims_db: Database<Bytes, Bytes>,

    pub(crate) pending_db: Database<Bytes, Bytes>,
    /// `next_attempt_be ++ 0x00 ++ pending_key` → pending_key.
    pub(crate) pending_due_db: Database<Bytes, Bytes>,

    pub(crate) pending_txs_db: Database<Bytes, Bytes>,
    /// `height_be ++ time_be ++ chain ++ 0x00 ++ tx_hash` → main key.
    pub(crate) pending_tx_order_db: Database<Bytes, Bytes>,

    pub(crate) costs_db: Database<Bytes, Bytes>,
    pub(crate) balances_db: Database<Bytes, Bytes>,

    pub(crate) credit_db: Database<Bytes, Bytes>,
    pub(crate) credit_cache_db: Database<Bytes, Bytes>,

    pub(crate) permissions_db: Database<Bytes, Bytes>,

    pub(crate) pins_db: Database<Bytes, Bytes>,
    /// `item_hash ++ 0x00 ++ content_ref` → () for forget-path removal.
    pub(crate) pins_by_msg_db: Database<Bytes, Bytes>,

    pub(crate) deletions_db: Database<Bytes, Bytes>,
    /// `delete_by_be ++ content_ref` → () for deadline scans.
    pub(crate) deletions_due_db: Database<Bytes, Bytes>,

    pub(crate) aggregates_db: Database<Bytes, Bytes>,
    pub(crate) heights_db: Database<Bytes, Bytes>,
    pub(crate) cron_db: Database<Bytes, Bytes>,
    pub(crate) error_codes_db: Database<Bytes, Bytes>,
    pub(crate) meta_db: Database<Bytes, Bytes>,
}

impl LmdbStore {
    /// Open or create the store at `path` with the given map size.
    ///
    /// Seeds the error-code table and stamps the schema version; opening a
    /// store written by an incompatible version fails instead of silently
    /// misreading it.
    pub fn open(path: &Path, map_size: usize) -> Result<Self, LmdbError> {
        std::fs::create_dir_all(path)
            .map_err(|e| LmdbError::Heed(format!("create data dir: {e}")))?;
        let env = unsafe { EnvOpenOptions::new().map_size(map_size).max_dbs(24).open(path)? };

        let mut wtxn = env.write_txn()?;
        let mut db = |name: &str| -> Result<Database<Bytes, Bytes>, LmdbError> {
            Ok(env.create_database(&mut wtxn, Some(name))?)
        };

        let store = Self {
            messages_db: db("messages")?,
            rejections_db: db("rejections")?,
            claims_db: db("claims")?,
            pending_db: db("pending_messages")?,
            pending_due_db: db("pending_messages_due")?,
            pending_txs_db: db("pending_txs")?,
            pending_tx_order_db: db("pending_txs_order")?,
            costs_db: db("account_costs")?,
            balances_db: db("balances")?,
            credit_db: db("credit_history")?,
            credit_cache_db: db("credit_balances")?,
            permissions_db: db("permissions")?,
            pins_db: db("file_pins")?,
            pins_by_msg_db: db("file_pins_by_message")?,
            deletions_db: db("scheduled_deletions")?,
            deletions_due_db: db("scheduled_deletions_due")?,
            aggregates_db: db("aggregate_elements")?,
            heights_db: db("chain_heights")?,
            cron_db: db("cron_jobs")?,
            error_codes_db: db("error_codes")?,
            meta_db: db("meta")?,
            env: env.clone(),
        };

        match store.meta_db.get(&wtxn, META_SCHEMA_VERSION)? {
            Some(raw) => {
                let found = decode_u64(raw)?;
                if found != SCHEMA_VERSION {
                    return Err(LmdbError::Corruption(format!(
                        "schema version {found}, expected {SCHEMA_VERSION}"
                    )));
                }
            }
            None => {
                store
                    .meta_db
                    .put(&mut wtxn, META_SCHEMA_VERSION, &SCHEMA_VERSION.to_be_bytes())?;
            }
        }

        for code in ErrorCode::ALL {
            store.error_codes_db.put(
                &mut wtxn,
                &code.code().to_be_bytes(),
                code.description().as_bytes(),
            )?;
        }

        wtxn.commit()?;
        Ok(store)
    }

    /// The persisted description for an error code, if seeded.
    pub fn error_code_description(&self, code: u16) -> Result<Option<String>, LmdbError> {
        let rtxn = self.env.read_txn()?;
        Ok(self
            .error_codes_db
            .get(&rtxn, &code.to_be_bytes())?
            .map(|raw| String::from_utf8_lossy(raw).into_owned()))
    }
}

pub(crate) fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, LmdbError> {
    Ok(serde_json::to_vec(value)?)
}

pub(crate) fn decode<T: DeserializeOwned>(raw: &[u8]) -> Result<T, LmdbError> {
    Ok(serde_json::from_slice(raw)?)
}

pub(crate) fn decode_u64(raw: &[u8]) -> Result<u64, LmdbError> {
    let bytes: [u8; 8] = raw
        .try_into()
        .map_err(|_| LmdbError::Corruption("u64 field has wrong length".into()))?;
    Ok(u64::from_be_bytes(bytes))
}

pub(crate) fn decode_u128(raw: &[u8]) -> Result<u128, LmdbError> {
    let bytes: [u8; 16] = raw
        .try_into()
        .map_err(|_| LmdbError::Corruption("u128 field has wrong length".into()))?;
    Ok(u128::from_be_bytes(bytes))
}
