use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Kind of value a document field holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Uuid,
    Integer,
    Number,
    Text,
}

impl FieldKind {
    /// Whether the field compares numerically in filters and indexes
    pub fn is_numeric(&self) -> bool {
        matches!(self, FieldKind::Integer | FieldKind::Number)
    }
}

/// A named field in a schema shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
}

/// Structural description of the documents a collection holds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaShape {
    /// Record type name
    pub name: String,
    /// Known fields; documents may carry more when the shape is open
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
    /// Fields the store should index
    #[serde(default)]
    pub indexes: Vec<String>,
}

impl SchemaShape {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            indexes: Vec::new(),
        }
    }

    pub fn field(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.push(FieldSpec {
            name: name.into(),
            kind,
        });
        self
    }

    pub fn index(mut self, name: impl Into<String>) -> Self {
        self.indexes.push(name.into());
        self
    }

    /// Look up the kind of a declared field
    pub fn kind_of(&self, name: &str) -> Option<FieldKind> {
        self.fields.iter().find(|f| f.name == name).map(|f| f.kind)
    }
}

/// A record type that can live in a store collection
pub trait Document: Serialize + DeserializeOwned + Send + Sync + 'static {
    fn schema() -> SchemaShape;
}

/// Flash sale offer for a single item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flash {
    /// Batch ID, assigned by the writer
    #[serde(default)]
    pub flash_id: Uuid,
    /// Product ID
    pub item_id: Uuid,
    /// Universal product code
    pub upc: u64,
    /// Stock-keeping unit
    pub sku: u64,
    /// Product name
    pub name: String,
    /// Where the product came from
    pub origin: String,
    /// Sensing device that reported the item
    pub device_id: Uuid,
    /// Original price
    pub price: f64,
    /// Discounted price
    pub sale_price: f64,
    /// Ethylene reading that triggered the sale
    pub ethylene: f64,
    /// Seconds since epoch, assigned by the writer
    #[serde(default)]
    pub timestamp: i64,
}

impl Document for Flash {
    fn schema() -> SchemaShape {
        SchemaShape::new("flash")
            .field("flash_id", FieldKind::Uuid)
            .field("item_id", FieldKind::Uuid)
            .field("upc", FieldKind::Integer)
            .field("sku", FieldKind::Integer)
            .field("name", FieldKind::Text)
            .field("origin", FieldKind::Text)
            .field("device_id", FieldKind::Uuid)
            .field("price", FieldKind::Number)
            .field("sale_price", FieldKind::Number)
            .field("ethylene", FieldKind::Number)
            .field("timestamp", FieldKind::Integer)
    }
}

/// Sensor reading; only `ethylene` is interpreted here
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub ethylene: f64,
    /// Remaining sensor fields, kept as stored
    #[serde(flatten)]
    pub readings: Map<String, Value>,
}

impl Document for Metric {
    fn schema() -> SchemaShape {
        SchemaShape::new("metric")
            .field("ethylene", FieldKind::Number)
            .index("ethylene")
    }
}

/// Inventory entry; schema owned by other services
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Inventory {
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Document for Inventory {
    fn schema() -> SchemaShape {
        SchemaShape::new("inventory")
    }
}

#[cfg(test)]
pub(crate) fn sample_flash() -> Flash {
    Flash {
        flash_id: Uuid::nil(),
        item_id: Uuid::new_v4(),
        upc: 111,
        sku: 5,
        name: "Apple".to_string(),
        origin: "Farm".to_string(),
        device_id: Uuid::new_v4(),
        price: 2.0,
        sale_price: 1.5,
        ethylene: 0.3,
        timestamp: 0,
    }
}
