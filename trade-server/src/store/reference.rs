//! Reference rows (clients, assets, payment methods)
//!
//! Maintained by external services; the trade server only seeds and reads them.

use super::{ASSETS_TABLE, CLIENTS_TABLE, PAYMENT_METHODS_TABLE, Storage, StorageResult, decode};
use redb::{ReadableDatabase, TableDefinition};
use serde::Serialize;
use serde::de::DeserializeOwned;
use shared::models::{Asset, Client, ClientPaymentMethod};

impl Storage {
    fn put_row<T: Serialize>(
        &self,
        definition: TableDefinition<'static, &'static str, &'static [u8]>,
        id: &str,
        row: &T,
    ) -> StorageResult<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(definition)?;
            let value = serde_json::to_vec(row)?;
            table.insert(id, value.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    fn get_row<T: DeserializeOwned>(
        &self,
        definition: TableDefinition<'static, &'static str, &'static [u8]>,
        id: &str,
    ) -> StorageResult<Option<T>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(definition)?;
        match table.get(id)? {
            Some(guard) => Ok(Some(decode(guard.value())?)),
            None => Ok(None),
        }
    }

    pub fn put_client(&self, client: &Client) -> StorageResult<()> {
        self.put_row(CLIENTS_TABLE, &client.id, client)
    }

    pub fn put_asset(&self, asset: &Asset) -> StorageResult<()> {
        self.put_row(ASSETS_TABLE, &asset.id, asset)
    }

    pub fn get_asset(&self, id: &str) -> StorageResult<Option<Asset>> {
        self.get_row(ASSETS_TABLE, id)
    }

    pub fn put_payment_method(&self, method: &ClientPaymentMethod) -> StorageResult<()> {
        self.put_row(PAYMENT_METHODS_TABLE, &method.id, method)
    }

    pub fn get_payment_method(&self, id: &str) -> StorageResult<Option<ClientPaymentMethod>> {
        self.get_row(PAYMENT_METHODS_TABLE, id)
    }
}
