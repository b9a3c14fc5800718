use crate::engine::model::ItemId;
use crate::plugins::registry::IdSource;
use uuid::Uuid;

pub struct UuidIds;

impl IdSource for UuidIds {
    fn new_id(&self) -> ItemId {
        Uuid::new_v4().to_string()
    }
}
