//! Cosmetic shop for pets, paid for with stickers.
//!
//! This module provides:
//! - The item catalog (slot type and price per item)
//! - Purchases that move stickers from the balance into the lifetime-spent counter
//! - Equip/unequip with at most one worn item per slot

use serde::{Deserialize, Serialize};

use crate::diary::errors::ShopError;
use crate::diary::types::{CosmeticSlot, UserRecord};

/// An item the shop sells.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CosmeticItem {
    pub id: String,
    pub name: String,
    pub slot: CosmeticSlot,
    /// Price in stickers
    pub price: u32,
}

impl CosmeticItem {
    pub fn new(id: &str, name: &str, slot: CosmeticSlot, price: u32) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            slot,
            price,
        }
    }
}

/// Default shop stock used when the configuration does not list items.
pub fn default_items() -> Vec<CosmeticItem> {
    vec![
        CosmeticItem::new("cap", "Baseball cap", CosmeticSlot::Head, 4),
        CosmeticItem::new("crown", "Golden crown", CosmeticSlot::Head, 10),
        CosmeticItem::new("bow", "Red bow", CosmeticSlot::Neck, 3),
        CosmeticItem::new("scarf", "Striped scarf", CosmeticSlot::Neck, 5),
        CosmeticItem::new("sneakers", "Sneakers", CosmeticSlot::Feet, 4),
        CosmeticItem::new("boots", "Rain boots", CosmeticSlot::Feet, 6),
        CosmeticItem::new("glasses", "Round glasses", CosmeticSlot::Accessory, 5),
        CosmeticItem::new("backpack", "School backpack", CosmeticSlot::Accessory, 7),
    ]
}

/// Read-only item lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    items: Vec<CosmeticItem>,
}

impl Catalog {
    pub fn new(items: Vec<CosmeticItem>) -> Self {
        Self { items }
    }

    pub fn items(&self) -> &[CosmeticItem] {
        &self.items
    }

    pub fn get(&self, item_id: &str) -> Option<&CosmeticItem> {
        self.items.iter().find(|item| item.id == item_id)
    }

    fn require(&self, item_id: &str) -> Result<&CosmeticItem, ShopError> {
        self.get(item_id)
            .ok_or_else(|| ShopError::UnknownItem(item_id.to_string()))
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new(default_items())
    }
}

/// Buys `item_id` for the user's pet. On any refusal the user is untouched.
pub fn purchase_item<'c>(
    user: &mut UserRecord,
    catalog: &'c Catalog,
    item_id: &str,
) -> Result<&'c CosmeticItem, ShopError> {
    let item = catalog.require(item_id)?;
    let balance = user.stickers;
    let pet = user.pet.as_mut().ok_or(ShopError::NoPet)?;
    if pet.owns(&item.id) {
        return Err(ShopError::AlreadyOwned(item.id.clone()));
    }
    if balance < item.price {
        return Err(ShopError::InsufficientFunds {
            price: item.price,
            balance,
        });
    }
    pet.inventory.insert(item.id.clone());
    user.stickers = balance - item.price;
    user.spent_stickers = user.spent_stickers.saturating_add(item.price);
    Ok(item)
}

/// Wears an owned item, replacing whatever occupied the slot. Returns the id
/// of the replaced item, which stays in the inventory.
pub fn equip_item(
    user: &mut UserRecord,
    catalog: &Catalog,
    item_id: &str,
) -> Result<Option<String>, ShopError> {
    let item = catalog.require(item_id)?;
    let pet = user.pet.as_mut().ok_or(ShopError::NoPet)?;
    if !pet.owns(&item.id) {
        return Err(ShopError::NotOwned(item.id.clone()));
    }
    let previous = pet.outfit.insert(item.slot, item.id.clone());
    Ok(previous.filter(|prev| prev != &item.id))
}

/// Takes off whatever is worn in `slot`.
pub fn unequip_item(user: &mut UserRecord, slot: CosmeticSlot) -> Result<Option<String>, ShopError> {
    let pet = user.pet.as_mut().ok_or(ShopError::NoPet)?;
    Ok(pet.outfit.remove(&slot))
}

/// Format the catalog for logs and the CLI status output.
pub fn format_catalog(catalog: &Catalog) -> String {
    let mut output = String::from("=== PET SHOP ===\n");
    for slot in CosmeticSlot::ALL {
        let items: Vec<&CosmeticItem> = catalog.items().iter().filter(|i| i.slot == slot).collect();
        if items.is_empty() {
            continue;
        }
        output.push_str(&format!("[{}]\n", slot.as_str()));
        for item in items {
            output.push_str(&format!("  {:<10} {:<18} {:>3} stickers\n", item.id, item.name, item.price));
        }
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diary::types::{PetRecord, Species};
    use chrono::Utc;

    fn owner(stickers: u32) -> UserRecord {
        let mut user = UserRecord::new("1", "Test", Utc::now());
        user.stickers = stickers;
        user.pet = Some(PetRecord::new(Species::Cat, "Fluffy", Utc::now()));
        user
    }

    #[test]
    fn purchase_with_exact_balance() {
        let catalog = Catalog::default();
        let mut user = owner(10);
        purchase_item(&mut user, &catalog, "crown").unwrap();
        assert_eq!(user.stickers, 0);
        assert_eq!(user.spent_stickers, 10);
        assert!(user.pet.as_ref().unwrap().owns("crown"));
    }

    #[test]
    fn purchase_one_short_changes_nothing() {
        let catalog = Catalog::default();
        let mut user = owner(9);
        let before = user.clone();
        assert_eq!(
            purchase_item(&mut user, &catalog, "crown"),
            Err(ShopError::InsufficientFunds {
                price: 10,
                balance: 9
            })
        );
        assert_eq!(user, before);
    }

    #[test]
    fn double_purchase_is_not_charged() {
        let catalog = Catalog::default();
        let mut user = owner(20);
        purchase_item(&mut user, &catalog, "bow").unwrap();
        assert_eq!(
            purchase_item(&mut user, &catalog, "bow"),
            Err(ShopError::AlreadyOwned("bow".to_string()))
        );
        assert_eq!(user.stickers, 17);
        assert_eq!(user.spent_stickers, 3);
    }

    #[test]
    fn unknown_item_is_rejected() {
        let catalog = Catalog::default();
        let mut user = owner(20);
        assert_eq!(
            purchase_item(&mut user, &catalog, "jetpack"),
            Err(ShopError::UnknownItem("jetpack".to_string()))
        );
    }

    #[test]
    fn equip_replaces_same_slot_and_keeps_inventory() {
        let catalog = Catalog::default();
        let mut user = owner(20);
        purchase_item(&mut user, &catalog, "cap").unwrap();
        purchase_item(&mut user, &catalog, "crown").unwrap();

        assert_eq!(equip_item(&mut user, &catalog, "cap").unwrap(), None);
        assert_eq!(
            equip_item(&mut user, &catalog, "crown").unwrap(),
            Some("cap".to_string())
        );
        let pet = user.pet.as_ref().unwrap();
        assert_eq!(pet.outfit.get(&CosmeticSlot::Head).map(String::as_str), Some("crown"));
        assert!(pet.owns("cap"));
        assert!(pet.owns("crown"));
    }

    #[test]
    fn equip_requires_ownership() {
        let catalog = Catalog::default();
        let mut user = owner(0);
        assert_eq!(
            equip_item(&mut user, &catalog, "scarf"),
            Err(ShopError::NotOwned("scarf".to_string()))
        );
    }

    #[test]
    fn unequip_empties_slot() {
        let catalog = Catalog::default();
        let mut user = owner(5);
        purchase_item(&mut user, &catalog, "glasses").unwrap();
        equip_item(&mut user, &catalog, "glasses").unwrap();
        assert_eq!(
            unequip_item(&mut user, CosmeticSlot::Accessory).unwrap(),
            Some("glasses".to_string())
        );
        assert_eq!(unequip_item(&mut user, CosmeticSlot::Accessory).unwrap(), None);
        assert!(user.pet.as_ref().unwrap().owns("glasses"));
    }
}
