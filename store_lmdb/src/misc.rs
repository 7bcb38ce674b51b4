//! LMDB implementations of the small tables: balances, permissions, chain
//! watermarks, and cron jobs.

use ccn_store::cron::{CronJob, CronStore};
use ccn_store::permissions::{Permission, PermissionStore};
use ccn_store::sync::ChainSyncStore;
use ccn_store::{BalanceStore, StoreError};
use ccn_types::{Address, Chain};

use crate::environment::{decode, decode_u128, decode_u64, encode, LmdbStore};
use crate::keys::composite;
use crate::LmdbError;

impl BalanceStore for LmdbStore {
    fn get_balance(&self, address: &Address) -> Result<u128, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        match self
            .balances_db
            .get(&rtxn, address.as_str().as_bytes())
            .map_err(LmdbError::from)?
        {
            Some(raw) => Ok(decode_u128(raw)?),
            None => Ok(0),
        }
    }

    fn put_balance(&self, address: &Address, amount: u128) -> Result<(), StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        self.balances_db
            .put(&mut wtxn, address.as_str().as_bytes(), &amount.to_be_bytes())
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }
}

impl PermissionStore for LmdbStore {
    fn put_permission(&self, permission: &Permission) -> Result<(), StoreError> {
        let key = composite(&[
            permission.owner.as_str().as_bytes(),
            permission.grantee.as_str().as_bytes(),
        ]);
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        let mut grants: Vec<Permission> = match self
            .permissions_db
            .get(&wtxn, &key)
            .map_err(LmdbError::from)?
        {
            Some(raw) => decode(raw)?,
            None => Vec::new(),
        };
        grants.push(permission.clone());
        let raw = encode(&grants)?;
        self.permissions_db
            .put(&mut wtxn, &key, &raw)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn grants_for(
        &self,
        owner: &Address,
        grantee: &Address,
    ) -> Result<Vec<Permission>, StoreError> {
        let key = composite(&[owner.as_str().as_bytes(), grantee.as_str().as_bytes()]);
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        match self.permissions_db.get(&rtxn, &key).map_err(LmdbError::from)? {
            Some(raw) => Ok(decode(raw)?),
            None => Ok(Vec::new()),
        }
    }
}

impl ChainSyncStore for LmdbStore {
    fn get_height(&self, chain: Chain) -> Result<Option<u64>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let raw = self
            .heights_db
            .get(&rtxn, chain.as_str().as_bytes())
            .map_err(LmdbError::from)?;
        Ok(raw.map(decode_u64).transpose()?)
    }

    fn advance_height(&self, chain: Chain, height: u64) -> Result<u64, StoreError> {
        let key = chain.as_str().as_bytes();
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        let current = match self.heights_db.get(&wtxn, key).map_err(LmdbError::from)? {
            Some(raw) => decode_u64(raw)?,
            None => 0,
        };
        let advanced = current.max(height);
        self.heights_db
            .put(&mut wtxn, key, &advanced.to_be_bytes())
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(advanced)
    }
}

impl CronStore for LmdbStore {
    fn get_cron_job(&self, id: &str) -> Result<Option<CronJob>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let raw = self
            .cron_db
            .get(&rtxn, id.as_bytes())
            .map_err(LmdbError::from)?;
        Ok(raw.map(decode).transpose()?)
    }

    fn upsert_cron_job(&self, job: &CronJob) -> Result<(), StoreError> {
        let raw = encode(job)?;
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        self.cron_db
            .put(&mut wtxn, job.id.as_bytes(), &raw)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn list_cron_jobs(&self) -> Result<Vec<CronJob>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let iter = self.cron_db.iter(&rtxn).map_err(LmdbError::from)?;
        let mut jobs = Vec::new();
        for result in iter {
            let (_key, raw) = result.map_err(LmdbError::from)?;
            jobs.push(decode(raw)?);
        }
        Ok(jobs)
    }
}
