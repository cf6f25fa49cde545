// character.rs — The game's in-memory character (mercenary) record.
//
// The record is never mirrored as a #[repr(C)] struct. Instead every field the
// inspector knows about is an entry in CharacterField with an offset and a
// width, and all access goes through ReadMemory/WriteMemory. A snapshot
// (Character) is a copy of the first RECORD_SIZE bytes of the record.

use crate::error::{Error, Result};
use crate::memory::{ReadMemory, WriteMemory};
use std::fmt;

// ============================================================
// Record Layout
// ============================================================
// Byte offsets from the start of the record (the constructor's `this`).

pub mod layout {
    /// ASCII "char" as stored by the constructor (`mov [esi+4], 'rahc'`).
    pub const TAG: usize = 0x04;
    pub const TAG_VALUE: u32 = u32::from_le_bytes(*b"rahc");

    pub const NAME: usize = 0x18;
    /// Name buffer size including the terminating NUL.
    pub const NAME_CAPACITY: usize = 16;
    pub const NAME_LENGTH: usize = 0x28;

    pub const FACTION: usize = 0x2C;
    pub const LEVEL: usize = 0x30;
    pub const EXPERIENCE: usize = 0x34;
    pub const TRAINING_POINTS: usize = 0x38;
    pub const HEALTH: usize = 0x3C;
    pub const STAMINA: usize = 0x40;
    pub const MEDICAL_CONDITION: usize = 0x44;

    // Attributes (u32)
    pub const AGILITY: usize = 0x48;
    pub const DEXTERITY: usize = 0x4C;
    pub const STRENGTH: usize = 0x50;
    pub const INTELLIGENCE: usize = 0x54;
    pub const PERCEPTION: usize = 0x58;

    // Skills (u32)
    pub const MEDICAL: usize = 0x5C;
    pub const EXPLOSIVES: usize = 0x60;
    pub const MARKSMANSHIP: usize = 0x64;
    pub const STEALTH: usize = 0x68;
    pub const MECHANICAL: usize = 0x6C;

    // Equipped items (u16 item id followed by its state)
    pub const WEAPON_IN_HAND: usize = 0x70;
    pub const WEAPON_IN_HAND_REMOVABLE: usize = 0x72;
    pub const WEAPON_IN_HAND_DURABILITY: usize = 0x74;
    pub const WEAPON_ATTACHMENT_REMOVABLE: usize = 0x76;
    pub const WEAPON_ATTACHMENT_STATUS: usize = 0x78;
    pub const AMMO: usize = 0x7A;
    pub const AMMO_COUNT: usize = 0x7C;
    pub const HELMET: usize = 0x7E;
    pub const HELMET_DURABILITY: usize = 0x80;
    pub const EYEWEAR: usize = 0x82;
    pub const EYEWEAR_DURABILITY: usize = 0x84;
    pub const SPECIAL: usize = 0x86;
    pub const SPECIAL_CHARGES: usize = 0x88;
    pub const SHIRT: usize = 0x8A;
    pub const SHIRT_DURABILITY: usize = 0x8C;
    pub const VEST: usize = 0x8E;
    pub const VEST_DURABILITY: usize = 0x90;
    pub const SHOES: usize = 0x92;
    pub const SHOES_DURABILITY: usize = 0x94;
    pub const PANTS: usize = 0x96;
    pub const PANTS_DURABILITY: usize = 0x98;

    // Inventory weapon slots: { weapon, removable, durability, ammo_count } u16 each
    pub const INVENTORY: usize = 0x9C;
    pub const INVENTORY_STRIDE: usize = 8;
    pub const INVENTORY_SLOTS: usize = 3;
    pub const SLOT_WEAPON: usize = 0;
    pub const SLOT_REMOVABLE: usize = 2;
    pub const SLOT_DURABILITY: usize = 4;
    pub const SLOT_AMMO_COUNT: usize = 6;

    pub const RECORD_SIZE: usize = INVENTORY + INVENTORY_STRIDE * INVENTORY_SLOTS;
}

/// Width/format of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    U16,
    U32,
    F32,
    Name,
    /// The record address itself (read-only).
    Address,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Int(u32),
    Float(f32),
    Text(String),
    Address(usize),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Int(v) => write!(f, "{}", v),
            FieldValue::Float(v) => write!(f, "{:.1}", v),
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Address(a) => write!(f, "{:X}", a),
        }
    }
}

// ============================================================
// Weapon Slots
// ============================================================

/// One of the three inventory weapon slots (0-based internally, 1-based in the UI).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WeaponSlot(usize);

impl WeaponSlot {
    pub fn new(index: usize) -> Option<Self> {
        (index < layout::INVENTORY_SLOTS).then_some(Self(index))
    }

    pub fn index(self) -> usize {
        self.0
    }

    pub fn all() -> impl Iterator<Item = WeaponSlot> {
        (0..layout::INVENTORY_SLOTS).map(WeaponSlot)
    }

    fn base(self) -> usize {
        layout::INVENTORY + self.0 * layout::INVENTORY_STRIDE
    }
}

impl fmt::Display for WeaponSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0 + 1)
    }
}

// ============================================================
// Fields
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CharacterField {
    Address,
    Name,
    Faction,
    Level,
    Experience,
    TrainingPoints,
    Health,
    Stamina,
    MedicalCondition,
    Agility,
    Dexterity,
    Strength,
    Intelligence,
    Perception,
    Medical,
    Explosives,
    Marksmanship,
    Stealth,
    Mechanical,
    WeaponInHand,
    WeaponInHandDurability,
    WeaponAttachmentRemovable,
    Ammo,
    AmmoCount,
    Helmet,
    HelmetDurability,
    Eyewear,
    EyewearDurability,
    Special,
    SpecialCharges,
    Shirt,
    ShirtDurability,
    Vest,
    VestDurability,
    Shoes,
    ShoesDurability,
    Pants,
    PantsDurability,
    InventoryWeapon,
    InventoryDurability,
    InventoryAmmoCount,
}

impl CharacterField {
    /// Display order used by the inspector and the dump.
    pub const ALL: [CharacterField; 41] = [
        Self::Address,
        Self::Name,
        Self::Faction,
        Self::Level,
        Self::Experience,
        Self::TrainingPoints,
        Self::Health,
        Self::Stamina,
        Self::MedicalCondition,
        Self::Agility,
        Self::Dexterity,
        Self::Strength,
        Self::Intelligence,
        Self::Perception,
        Self::Medical,
        Self::Explosives,
        Self::Marksmanship,
        Self::Stealth,
        Self::Mechanical,
        Self::WeaponInHand,
        Self::WeaponInHandDurability,
        Self::WeaponAttachmentRemovable,
        Self::Ammo,
        Self::AmmoCount,
        Self::Helmet,
        Self::HelmetDurability,
        Self::Eyewear,
        Self::EyewearDurability,
        Self::Special,
        Self::SpecialCharges,
        Self::Shirt,
        Self::ShirtDurability,
        Self::Vest,
        Self::VestDurability,
        Self::Shoes,
        Self::ShoesDurability,
        Self::Pants,
        Self::PantsDurability,
        Self::InventoryWeapon,
        Self::InventoryDurability,
        Self::InventoryAmmoCount,
    ];

    pub fn label(self) -> &'static str {
        use CharacterField::*;
        match self {
            Address => "Address",
            Name => "Name",
            Faction => "Faction",
            Level => "Level",
            Experience => "Experience",
            TrainingPoints => "Training points",
            Health => "Health",
            Stamina => "Stamina",
            MedicalCondition => "Medical condition",
            Agility => "Agility",
            Dexterity => "Dexterity",
            Strength => "Strength",
            Intelligence => "Intelligence",
            Perception => "Perception",
            Medical => "Medical",
            Explosives => "Explosives",
            Marksmanship => "Marksmanship",
            Stealth => "Stealth",
            Mechanical => "Mechanical",
            WeaponInHand => "Weapon in hand",
            WeaponInHandDurability => "Weapon durability",
            WeaponAttachmentRemovable => "Weapon attachment",
            Ammo => "Ammo",
            AmmoCount => "Ammo count",
            Helmet => "Helmet",
            HelmetDurability => "Helmet durability",
            Eyewear => "Eyewear",
            EyewearDurability => "Eyewear durability",
            Special => "Special",
            SpecialCharges => "Special charges",
            Shirt => "Shirt",
            ShirtDurability => "Shirt durability",
            Vest => "Vest",
            VestDurability => "Vest durability",
            Shoes => "Shoes",
            ShoesDurability => "Shoes durability",
            Pants => "Pants",
            PantsDurability => "Pants durability",
            InventoryWeapon => "Inventory weapon",
            InventoryDurability => "Inventory durability",
            InventoryAmmoCount => "Inventory ammo",
        }
    }

    pub fn kind(self) -> FieldKind {
        use CharacterField::*;
        match self {
            Address => FieldKind::Address,
            Name => FieldKind::Name,
            Health | Stamina => FieldKind::F32,
            Faction | Level | Experience | TrainingPoints | MedicalCondition | Agility
            | Dexterity | Strength | Intelligence | Perception | Medical | Explosives
            | Marksmanship | Stealth | Mechanical => FieldKind::U32,
            _ => FieldKind::U16,
        }
    }

    /// Whether the value depends on the selected weapon slot.
    pub fn per_slot(self) -> bool {
        matches!(
            self,
            Self::InventoryWeapon | Self::InventoryDurability | Self::InventoryAmmoCount
        )
    }

    pub fn is_editable(self) -> bool {
        self.kind() != FieldKind::Address
    }

    /// Offset from the record start, or None for the address pseudo-field.
    pub fn offset(self, slot: WeaponSlot) -> Option<usize> {
        use layout as l;
        use CharacterField::*;
        let off = match self {
            Address => return None,
            Name => l::NAME,
            Faction => l::FACTION,
            Level => l::LEVEL,
            Experience => l::EXPERIENCE,
            TrainingPoints => l::TRAINING_POINTS,
            Health => l::HEALTH,
            Stamina => l::STAMINA,
            MedicalCondition => l::MEDICAL_CONDITION,
            Agility => l::AGILITY,
            Dexterity => l::DEXTERITY,
            Strength => l::STRENGTH,
            Intelligence => l::INTELLIGENCE,
            Perception => l::PERCEPTION,
            Medical => l::MEDICAL,
            Explosives => l::EXPLOSIVES,
            Marksmanship => l::MARKSMANSHIP,
            Stealth => l::STEALTH,
            Mechanical => l::MECHANICAL,
            WeaponInHand => l::WEAPON_IN_HAND,
            WeaponInHandDurability => l::WEAPON_IN_HAND_DURABILITY,
            WeaponAttachmentRemovable => l::WEAPON_ATTACHMENT_REMOVABLE,
            Ammo => l::AMMO,
            AmmoCount => l::AMMO_COUNT,
            Helmet => l::HELMET,
            HelmetDurability => l::HELMET_DURABILITY,
            Eyewear => l::EYEWEAR,
            EyewearDurability => l::EYEWEAR_DURABILITY,
            Special => l::SPECIAL,
            SpecialCharges => l::SPECIAL_CHARGES,
            Shirt => l::SHIRT,
            ShirtDurability => l::SHIRT_DURABILITY,
            Vest => l::VEST,
            VestDurability => l::VEST_DURABILITY,
            Shoes => l::SHOES,
            ShoesDurability => l::SHOES_DURABILITY,
            Pants => l::PANTS,
            PantsDurability => l::PANTS_DURABILITY,
            InventoryWeapon => slot.base() + l::SLOT_WEAPON,
            InventoryDurability => slot.base() + l::SLOT_DURABILITY,
            InventoryAmmoCount => slot.base() + l::SLOT_AMMO_COUNT,
        };
        Some(off)
    }

    /// Parse user input for this field.
    pub fn parse(self, input: &str) -> Result<FieldValue> {
        let s = input.trim();
        let bad = || Error::InvalidField { field: self.label(), input: input.to_string() };
        match self.kind() {
            FieldKind::U16 => s.parse::<u16>().map(|v| FieldValue::Int(v as u32)).map_err(|_| bad()),
            FieldKind::U32 => s.parse::<u32>().map(FieldValue::Int).map_err(|_| bad()),
            FieldKind::F32 => match s.parse::<f32>() {
                Ok(v) if v.is_finite() => Ok(FieldValue::Float(v)),
                _ => Err(bad()),
            },
            FieldKind::Name => {
                if !input.is_ascii() {
                    return Err(bad());
                }
                Ok(FieldValue::Text(truncate_name(input).to_string()))
            }
            FieldKind::Address => Err(bad()),
        }
    }
}

/// The longest prefix of `name` that fits the name buffer with its NUL.
fn truncate_name(name: &str) -> &str {
    let mut end = name.len().min(layout::NAME_CAPACITY - 1);
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    &name[..end]
}

// ============================================================
// Snapshot
// ============================================================

/// A copy of a character record taken at one point in time.
#[derive(Clone)]
pub struct Character {
    address: usize,
    bytes: Vec<u8>,
}

impl fmt::Debug for Character {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Character")
            .field("address", &format_args!("{:08X}", self.address))
            .field("name", &self.name())
            .field("level", &self.u32_at(layout::LEVEL))
            .finish()
    }
}

/// Whether `address` looks like a live character record.
pub fn is_character<M: ReadMemory>(mem: &M, address: usize) -> bool {
    matches!(mem.read_u32(address + layout::TAG), Ok(layout::TAG_VALUE))
}

impl Character {
    pub fn read<M: ReadMemory>(mem: &M, address: usize) -> Result<Self> {
        let bytes = mem.read_vec(address, layout::RECORD_SIZE)?;
        let c = Self { address, bytes };
        if c.u32_at(layout::TAG) != layout::TAG_VALUE {
            return Err(Error::NotACharacter(address));
        }
        Ok(c)
    }

    pub fn address(&self) -> usize {
        self.address
    }

    fn u16_at(&self, off: usize) -> u16 {
        u16::from_le_bytes([self.bytes[off], self.bytes[off + 1]])
    }

    fn u32_at(&self, off: usize) -> u32 {
        let b = &self.bytes[off..off + 4];
        u32::from_le_bytes([b[0], b[1], b[2], b[3]])
    }

    pub fn name(&self) -> String {
        let len = (self.u32_at(layout::NAME_LENGTH) as usize).min(layout::NAME_CAPACITY);
        let raw = &self.bytes[layout::NAME..layout::NAME + len];
        let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        String::from_utf8_lossy(&raw[..end]).into_owned()
    }

    pub fn level(&self) -> u32 {
        self.u32_at(layout::LEVEL)
    }

    pub fn health(&self) -> f32 {
        f32::from_bits(self.u32_at(layout::HEALTH))
    }

    pub fn value(&self, field: CharacterField, slot: WeaponSlot) -> FieldValue {
        let off = match field.offset(slot) {
            Some(off) => off,
            None => return FieldValue::Address(self.address),
        };
        match field.kind() {
            FieldKind::U16 => FieldValue::Int(self.u16_at(off) as u32),
            FieldKind::U32 => FieldValue::Int(self.u32_at(off)),
            FieldKind::F32 => FieldValue::Float(f32::from_bits(self.u32_at(off))),
            FieldKind::Name => FieldValue::Text(self.name()),
            FieldKind::Address => FieldValue::Address(self.address),
        }
    }

    /// Value formatted the way the inspector shows it.
    pub fn display(&self, field: CharacterField, slot: WeaponSlot) -> String {
        self.value(field, slot).to_string()
    }
}

// ============================================================
// Editing
// ============================================================

fn write_value<M: WriteMemory>(mem: &mut M, at: usize, kind: FieldKind, value: &FieldValue) -> Result<()> {
    match (kind, value) {
        (FieldKind::U16, FieldValue::Int(v)) => mem.write_u16(at, *v as u16),
        (FieldKind::U32, FieldValue::Int(v)) => mem.write_u32(at, *v),
        (FieldKind::F32, FieldValue::Float(v)) => mem.write_f32(at, *v),
        (FieldKind::Name, FieldValue::Text(s)) => {
            let mut buf = [0u8; layout::NAME_CAPACITY];
            buf[..s.len()].copy_from_slice(s.as_bytes());
            mem.write_bytes(at, &buf)
        }
        _ => Ok(()),
    }
}

/// Write the edited fields into the record at `address`.
///
/// Fields whose input does not parse are skipped and returned; everything
/// else is written. Editing also marks the in-hand weapon and the selected
/// inventory slot as removable, and sets the attachment status, so the game
/// accepts the new items.
pub fn apply_edits<M: WriteMemory>(
    mem: &mut M,
    address: usize,
    slot: WeaponSlot,
    edits: &[(CharacterField, String)],
) -> Result<Vec<Error>> {
    if !is_character(mem, address) {
        return Err(Error::NotACharacter(address));
    }

    let mut rejected = Vec::new();
    for (field, input) in edits {
        let off = match field.offset(slot) {
            Some(off) if field.is_editable() => off,
            _ => continue,
        };
        match field.parse(input) {
            Ok(value) => {
                write_value(mem, address + off, field.kind(), &value)?;
                if let FieldValue::Text(name) = &value {
                    mem.write_u32(address + layout::NAME_LENGTH, name.len() as u32)?;
                }
            }
            Err(e) => rejected.push(e),
        }
    }

    mem.write_u16(address + layout::WEAPON_IN_HAND_REMOVABLE, 1)?;
    mem.write_u16(address + layout::WEAPON_ATTACHMENT_STATUS, 1)?;
    mem.write_u16(address + slot.base() + layout::SLOT_REMOVABLE, 1)?;
    Ok(rejected)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::memory::BufferMemory;

    pub(crate) const REC: usize = 0x0A00_0000;

    /// A buffer holding one tagged record named "Ivan" at REC.
    pub(crate) fn sample() -> BufferMemory {
        let mut mem = BufferMemory::new(REC, layout::RECORD_SIZE);
        mem.write_u32(REC + layout::TAG, layout::TAG_VALUE).unwrap();
        mem.write_bytes(REC + layout::NAME, b"Ivan").unwrap();
        mem.write_u32(REC + layout::NAME_LENGTH, 4).unwrap();
        mem.write_u32(REC + layout::LEVEL, 3).unwrap();
        mem.write_u32(REC + layout::EXPERIENCE, 1250).unwrap();
        mem.write_f32(REC + layout::HEALTH, 87.3).unwrap();
        mem.write_u16(REC + layout::SHOES_DURABILITY, 40).unwrap();
        mem.write_u16(REC + layout::INVENTORY + layout::INVENTORY_STRIDE + layout::SLOT_AMMO_COUNT, 30)
            .unwrap();
        mem
    }

    #[test]
    fn test_layout_fields_do_not_overlap() {
        let slot = WeaponSlot::default();
        let mut spans: Vec<(usize, usize)> = CharacterField::ALL
            .iter()
            .filter_map(|f| {
                let width = match f.kind() {
                    FieldKind::U16 => 2,
                    FieldKind::U32 | FieldKind::F32 => 4,
                    FieldKind::Name => layout::NAME_CAPACITY,
                    FieldKind::Address => return None,
                };
                f.offset(slot).map(|o| (o, o + width))
            })
            .collect();
        spans.sort();
        for w in spans.windows(2) {
            assert!(w[0].1 <= w[1].0, "{:?} overlaps {:?}", w[0], w[1]);
        }
        assert!(spans.last().unwrap().1 <= layout::RECORD_SIZE);
    }

    #[test]
    fn test_read_snapshot_and_display() {
        let mem = sample();
        let c = Character::read(&mem, REC).unwrap();
        assert_eq!(c.name(), "Ivan");
        assert_eq!(c.level(), 3);
        let slot0 = WeaponSlot::default();
        let slot1 = WeaponSlot::new(1).unwrap();
        assert_eq!(c.display(CharacterField::Address, slot0), "A000000");
        assert_eq!(c.display(CharacterField::Experience, slot0), "1250");
        assert_eq!(c.display(CharacterField::Health, slot0), "87.3");
        assert_eq!(c.display(CharacterField::InventoryAmmoCount, slot0), "0");
        assert_eq!(c.display(CharacterField::InventoryAmmoCount, slot1), "30");
    }

    #[test]
    fn test_read_rejects_untagged_record() {
        let mem = BufferMemory::new(REC, layout::RECORD_SIZE);
        assert!(matches!(Character::read(&mem, REC), Err(Error::NotACharacter(REC))));
    }

    #[test]
    fn test_name_length_is_clamped() {
        let mut mem = sample();
        mem.write_u32(REC + layout::NAME_LENGTH, 500).unwrap();
        let c = Character::read(&mem, REC).unwrap();
        assert_eq!(c.name(), "Ivan");
    }

    #[test]
    fn test_parse_respects_field_width() {
        assert_eq!(CharacterField::Level.parse(" 12 ").unwrap(), FieldValue::Int(12));
        assert!(CharacterField::Helmet.parse("70000").is_err());
        assert!(CharacterField::Experience.parse("-1").is_err());
        assert!(CharacterField::Health.parse("NaN").is_err());
        assert_eq!(CharacterField::Stamina.parse("55.5").unwrap(), FieldValue::Float(55.5));
        assert_eq!(
            CharacterField::Name.parse("ThisNameIsTooLong").unwrap(),
            FieldValue::Text("ThisNameIsTooLo".to_string())
        );
        assert!(CharacterField::Name.parse("Иван").is_err());
        assert!(CharacterField::Address.parse("1234").is_err());
    }

    #[test]
    fn test_apply_edits_writes_fields_and_flags() {
        let mut mem = sample();
        let slot = WeaponSlot::new(2).unwrap();
        let edits = vec![
            (CharacterField::Level, "10".to_string()),
            (CharacterField::Health, "100".to_string()),
            (CharacterField::Name, "Raven".to_string()),
            (CharacterField::ShoesDurability, "99".to_string()),
            (CharacterField::InventoryWeapon, "17".to_string()),
            (CharacterField::Address, "0".to_string()),
        ];
        let rejected = apply_edits(&mut mem, REC, slot, &edits).unwrap();
        assert!(rejected.is_empty());

        let c = Character::read(&mem, REC).unwrap();
        assert_eq!(c.level(), 10);
        assert_eq!(c.health(), 100.0);
        assert_eq!(c.name(), "Raven");
        assert_eq!(mem.read_u32(REC + layout::NAME_LENGTH).unwrap(), 5);
        assert_eq!(mem.read_u16(REC + layout::SHOES_DURABILITY).unwrap(), 99);
        assert_eq!(mem.read_u16(REC + layout::VEST_DURABILITY).unwrap(), 0);
        assert_eq!(c.display(CharacterField::InventoryWeapon, slot), "17");

        assert_eq!(mem.read_u16(REC + layout::WEAPON_IN_HAND_REMOVABLE).unwrap(), 1);
        assert_eq!(mem.read_u16(REC + layout::WEAPON_ATTACHMENT_STATUS).unwrap(), 1);
        let removable = |i: usize| {
            mem.read_u16(REC + layout::INVENTORY + i * layout::INVENTORY_STRIDE + layout::SLOT_REMOVABLE)
                .unwrap()
        };
        assert_eq!((removable(0), removable(1), removable(2)), (0, 0, 1));
    }

    #[test]
    fn test_long_name_is_truncated_to_buffer() {
        let mut mem = sample();
        let edits = vec![(CharacterField::Name, "Sixteen_Chars_Ab".to_string())];
        let rejected = apply_edits(&mut mem, REC, WeaponSlot::default(), &edits).unwrap();
        assert!(rejected.is_empty());

        let c = Character::read(&mem, REC).unwrap();
        assert_eq!(c.name(), "Sixteen_Chars_A");
        assert_eq!(mem.read_u32(REC + layout::NAME_LENGTH).unwrap(), 15);
        // The last byte of the buffer stays the terminator.
        assert_eq!(mem.read_vec(REC + layout::NAME + 15, 1).unwrap(), [0]);
    }

    #[test]
    fn test_shorter_name_clears_old_bytes() {
        let mut mem = sample();
        let edits = vec![(CharacterField::Name, "Al".to_string())];
        apply_edits(&mut mem, REC, WeaponSlot::default(), &edits).unwrap();
        assert_eq!(mem.read_vec(REC + layout::NAME, 4).unwrap(), b"Al\0\0");
    }

    #[test]
    fn test_apply_edits_reports_bad_input_and_keeps_going() {
        let mut mem = sample();
        let edits = vec![
            (CharacterField::Level, "lots".to_string()),
            (CharacterField::Strength, "80".to_string()),
        ];
        let rejected = apply_edits(&mut mem, REC, WeaponSlot::default(), &edits).unwrap();
        assert_eq!(rejected.len(), 1);
        assert!(rejected[0].to_string().starts_with("Level"));
        assert_eq!(mem.read_u32(REC + layout::LEVEL).unwrap(), 3);
        assert_eq!(mem.read_u32(REC + layout::STRENGTH).unwrap(), 80);
    }

    #[test]
    fn test_apply_edits_refuses_stale_pointer() {
        let mut mem = sample();
        mem.write_u32(REC + layout::TAG, 0).unwrap();
        let edits = vec![(CharacterField::Level, "10".to_string())];
        assert!(apply_edits(&mut mem, REC, WeaponSlot::default(), &edits).is_err());
        assert_eq!(mem.read_u32(REC + layout::LEVEL).unwrap(), 3);
    }

    #[test]
    fn test_weapon_slot_bounds() {
        assert!(WeaponSlot::new(3).is_none());
        assert_eq!(WeaponSlot::all().map(|s| s.to_string()).collect::<Vec<_>>(), ["1", "2", "3"]);
    }
}
