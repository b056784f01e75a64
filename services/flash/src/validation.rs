use crate::model::Flash;
use serde::Serialize;
use std::fmt;

/// Largest sale price accepted, the maximum signed 64-bit integer
pub const MAX_SALE_PRICE: f64 = i64::MAX as f64;

/// Flash sale fields, in the order they are checked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FlashField {
    FlashId,
    ItemId,
    Upc,
    Sku,
    Name,
    Origin,
    DeviceId,
    Price,
    SalePrice,
    Ethylene,
}

impl FlashField {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlashField::FlashId => "FlashID",
            FlashField::ItemId => "ItemID",
            FlashField::Upc => "UPC",
            FlashField::Sku => "SKU",
            FlashField::Name => "Name",
            FlashField::Origin => "Origin",
            FlashField::DeviceId => "DeviceID",
            FlashField::Price => "Price",
            FlashField::SalePrice => "Sale Price",
            FlashField::Ethylene => "Ethylene",
        }
    }
}

impl fmt::Display for FlashField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Check a stamped record, returning the first field that fails.
///
/// Checks run in a fixed order: FlashID, ItemID, UPC, SKU, Name, Origin,
/// DeviceID, Price, Sale Price, Ethylene. Price and ethylene must be finite
/// and non-zero. A sale price must lie in `0..=MAX_SALE_PRICE`; `NaN` is
/// rejected.
pub fn validate_flash(flash: &Flash) -> Result<(), FlashField> {
    if flash.flash_id.is_nil() {
        return Err(FlashField::FlashId);
    }
    if flash.item_id.is_nil() {
        return Err(FlashField::ItemId);
    }
    if flash.upc == 0 {
        return Err(FlashField::Upc);
    }
    if flash.sku == 0 {
        return Err(FlashField::Sku);
    }
    if flash.name.is_empty() {
        return Err(FlashField::Name);
    }
    if flash.origin.is_empty() {
        return Err(FlashField::Origin);
    }
    if flash.device_id.is_nil() {
        return Err(FlashField::DeviceId);
    }
    if flash.price == 0.0 || !flash.price.is_finite() {
        return Err(FlashField::Price);
    }
    if !(0.0..=MAX_SALE_PRICE).contains(&flash.sale_price) {
        return Err(FlashField::SalePrice);
    }
    if flash.ethylene == 0.0 || !flash.ethylene.is_finite() {
        return Err(FlashField::Ethylene);
    }

    Ok(())
}
