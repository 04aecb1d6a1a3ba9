//! Window and slot model plus the planning helpers behind `.click`, `.drop`,
//! `.armor` and `.sort`.
//!
//! Slot numbering follows the player inventory window: 5..=8 are armor,
//! 9..=35 the main grid, 36..=44 the hotbar.

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

pub const STORAGE_SLOTS: RangeInclusive<usize> = 9..=44;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Item {
    /// Registry name, e.g. `diamond_sword`.
    pub name: String,
    /// Human-facing name, possibly renamed or formatted.
    #[serde(default)]
    pub display_name: String,
    #[serde(default = "default_count")]
    pub count: u32,
}

fn default_count() -> u32 {
    1
}

impl Item {
    pub fn label(&self) -> &str {
        if self.display_name.is_empty() {
            &self.name
        } else {
            &self.display_name
        }
    }

    /// Case-insensitive substring match against name or display name.
    pub fn matches(&self, fragment: &str) -> bool {
        let needle = fragment.to_lowercase();
        self.name.to_lowercase().contains(&needle)
            || self.display_name.to_lowercase().contains(&needle)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct Window {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub slots: Vec<Option<Item>>,
}

impl Window {
    pub fn item(&self, slot: usize) -> Option<&Item> {
        self.slots.get(slot).and_then(Option::as_ref)
    }

    pub fn has_slot(&self, slot: usize) -> bool {
        slot < self.slots.len()
    }

    /// First slot whose item matches `fragment`.
    pub fn find(&self, fragment: &str) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| slot.as_ref().is_some_and(|item| item.matches(fragment)))
    }

    /// First slot holding exactly `name`, or whose display name contains it.
    pub fn find_marker(&self, name: &str) -> Option<usize> {
        let needle = name.to_lowercase();
        self.slots.iter().position(|slot| {
            slot.as_ref().is_some_and(|item| {
                item.name.eq_ignore_ascii_case(name)
                    || item.display_name.to_lowercase().contains(&needle)
            })
        })
    }

    /// Occupied slots within `range`.
    pub fn occupied(&self, range: RangeInclusive<usize>) -> Vec<usize> {
        range.filter(|&slot| self.item(slot).is_some()).collect()
    }
}

/// Armor body slot, named the way the bridge expects them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquipSlot {
    Head,
    Torso,
    Legs,
    Feet,
}

impl EquipSlot {
    const ALL: [EquipSlot; 4] = [Self::Head, Self::Torso, Self::Legs, Self::Feet];

    fn suffixes(self) -> &'static [&'static str] {
        match self {
            Self::Head => &["_helmet", "_skull", "_head"],
            Self::Torso => &["_chestplate", "elytra"],
            Self::Legs => &["_leggings"],
            Self::Feet => &["_boots"],
        }
    }

    /// Inventory slot this body part is displayed in.
    fn worn_slot(self) -> usize {
        match self {
            Self::Head => 5,
            Self::Torso => 6,
            Self::Legs => 7,
            Self::Feet => 8,
        }
    }

    fn fits(self, item: &Item) -> bool {
        self.suffixes().iter().any(|s| item.name.ends_with(s))
    }
}

/// Rough protection ranking by material; unknown wearables rank lowest.
fn armor_tier(item: &Item) -> u8 {
    const TIERS: [(&str, u8); 7] = [
        ("netherite_", 7),
        ("diamond_", 6),
        ("iron_", 5),
        ("turtle_", 4),
        ("chainmail_", 4),
        ("golden_", 3),
        ("leather_", 2),
    ];
    TIERS
        .iter()
        .find(|(prefix, _)| item.name.starts_with(prefix))
        .map(|(_, tier)| *tier)
        .unwrap_or(1)
}

/// Pick the best storage item for each body slot that beats what is worn.
pub fn armor_plan(inventory: &Window) -> Vec<(usize, EquipSlot)> {
    let mut plan = Vec::new();
    for part in EquipSlot::ALL {
        let worn = inventory
            .item(part.worn_slot())
            .map(armor_tier)
            .unwrap_or(0);
        let best = STORAGE_SLOTS
            .filter_map(|slot| inventory.item(slot).map(|item| (slot, item)))
            .filter(|(_, item)| part.fits(item))
            .max_by_key(|(slot, item)| (armor_tier(item), std::cmp::Reverse(*slot)));
        if let Some((slot, item)) = best {
            if armor_tier(item) > worn {
                plan.push((slot, part));
            }
        }
    }
    plan
}

fn sort_key(item: Option<&Item>) -> (bool, &str) {
    match item {
        Some(item) => (false, item.name.as_str()),
        None => (true, ""),
    }
}

/// Swaps that sort the storage slots by item name, empties last.
///
/// Items with the same name are never swapped with each other, so a click
/// swap never merges stacks.
pub fn sort_plan(inventory: &Window) -> Vec<(usize, usize)> {
    let slots: Vec<usize> = STORAGE_SLOTS
        .filter(|&slot| inventory.has_slot(slot))
        .collect();
    let mut current: Vec<Option<Item>> = slots
        .iter()
        .map(|&slot| inventory.item(slot).cloned())
        .collect();

    let mut target = current.clone();
    target.sort_by(|a, b| sort_key(a.as_ref()).cmp(&sort_key(b.as_ref())));

    let mut swaps = Vec::new();
    for i in 0..current.len() {
        let wanted = sort_key(target[i].as_ref());
        if sort_key(current[i].as_ref()) == wanted {
            continue;
        }
        let Some(j) = (i + 1..current.len()).find(|&j| sort_key(current[j].as_ref()) == wanted)
        else {
            continue;
        };
        current.swap(i, j);
        swaps.push((slots[i], slots[j]));
    }
    swaps
}
