use crate::{Error, LogDatastore, Result};
use async_trait::async_trait;
use rocksdb::WriteBatch;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A JSON document stored under a key derived from its own fields.
///
/// `ID_PATH` is a template such as `/trees/${log_id}`; each `${name}` is
/// filled from [`Model::get_id_keys`].
#[async_trait]
pub trait Model: Sized + Serialize + for<'de> Deserialize<'de> + Send + Sync {
    const ID_PATH: &'static str;

    fn get_id_keys(&self) -> HashMap<String, String>;

    fn get_key_names() -> Vec<String> {
        let re = regex::Regex::new(r"\$\{(\w+)\}").expect("static pattern");
        re.captures_iter(Self::ID_PATH)
            .map(|cap| cap[1].to_string())
            .collect()
    }

    fn get_id_for(keys: &HashMap<String, String>) -> Result<String> {
        let mut id = String::from(Self::ID_PATH);
        for name in Self::get_key_names() {
            let value = keys
                .get(&name)
                .ok_or_else(|| Error::InvalidData(format!("missing id key {} for {}", name, Self::ID_PATH)))?;
            id = id.replace(&format!("${{{}}}", name), value);
        }
        Ok(id)
    }

    fn get_id(&self) -> Result<String> {
        Self::get_id_for(&self.get_id_keys())
    }

    fn from_json_string(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    fn from_json_bytes(json: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(json)?)
    }

    fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    async fn save(&self, datastore: &LogDatastore) -> Result<()> {
        let json = self.to_json_string()?;
        datastore.put(&self.get_id()?, json.as_bytes()).await
    }

    /// Stages the document in `batch` instead of writing it immediately.
    fn save_to_batch(&self, batch: &mut WriteBatch) -> Result<()> {
        batch.put(self.get_id()?, self.to_json_string()?);
        Ok(())
    }

    async fn find_one(datastore: &LogDatastore, keys: HashMap<String, String>) -> Result<Option<Self>> {
        let key = Self::get_id_for(&keys)?;
        match datastore.get_string(&key).await? {
            Some(value) => Ok(Some(Self::from_json_string(&value)?)),
            None => Ok(None),
        }
    }

    /// Every document stored below `prefix`, in key order, at most `limit`.
    async fn find_all_below(datastore: &LogDatastore, prefix: &str, limit: Option<usize>) -> Result<Vec<Self>> {
        let mut models = Vec::new();
        for result in datastore.iterator(prefix).take(limit.unwrap_or(usize::MAX)) {
            let (_, value) = result?;
            models.push(Self::from_json_bytes(&value)?);
        }
        Ok(models)
    }

    async fn reload(&mut self, datastore: &LogDatastore) -> Result<()> {
        let id = self.get_id()?;
        match Self::find_one(datastore, self.get_id_keys()).await? {
            Some(obj) => {
                *self = obj;
                Ok(())
            }
            None => Err(Error::KeyNotFound(id)),
        }
    }

    async fn delete(&self, datastore: &LogDatastore) -> Result<()> {
        datastore.delete(&self.get_id()?).await
    }
}
