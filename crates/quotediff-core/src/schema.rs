//! Line-item field schema shared by extraction, normalization and diffing.

use serde::{Deserialize, Serialize};

/// A comparable attribute of a line item.
///
/// `name` and `section` are identity attributes and live directly on
/// [`crate::Record`]; everything here is a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Amount,
    Service,
    Database,
    TierName,
    TierType,
    Ram,
    HanaNodes,
    StandbyNodes,
    Storage,
    Os,
    Sla,
    Dr,
    DrHardware,
    Pacemaker,
    Phase,
    Server,
}

/// How a field's display value is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    /// Free text, compared case- and whitespace-insensitively.
    Text,
    /// Plain non-negative number (quantities, amounts).
    Number,
    /// Memory or disk size, canonicalized to GB.
    Capacity,
    /// Percentage in 0..=100.
    Percent,
    /// Non-negative integer count.
    Count,
    /// Yes/no.
    Flag,
    /// Ordinal position (phase 1, 2, ...).
    Ordinal,
}

impl Field {
    /// All fields in report order.
    pub const ALL: [Field; 16] = [
        Field::Amount,
        Field::Service,
        Field::Database,
        Field::TierName,
        Field::TierType,
        Field::Ram,
        Field::HanaNodes,
        Field::StandbyNodes,
        Field::Storage,
        Field::Os,
        Field::Sla,
        Field::Dr,
        Field::DrHardware,
        Field::Pacemaker,
        Field::Phase,
        Field::Server,
    ];

    pub fn kind(self) -> FieldKind {
        match self {
            Field::Amount => FieldKind::Number,
            Field::Service
            | Field::Database
            | Field::TierName
            | Field::TierType
            | Field::Os
            | Field::Server => FieldKind::Text,
            Field::Ram | Field::Storage => FieldKind::Capacity,
            Field::HanaNodes | Field::StandbyNodes => FieldKind::Count,
            Field::Sla => FieldKind::Percent,
            Field::Dr | Field::DrHardware | Field::Pacemaker => FieldKind::Flag,
            Field::Phase => FieldKind::Ordinal,
        }
    }

    /// Stable snake_case key, used in JSON payloads.
    pub fn key(self) -> &'static str {
        match self {
            Field::Amount => "amount",
            Field::Service => "service",
            Field::Database => "database",
            Field::TierName => "tier_name",
            Field::TierType => "tier_type",
            Field::Ram => "ram",
            Field::HanaNodes => "hana_nodes",
            Field::StandbyNodes => "standby_nodes",
            Field::Storage => "storage",
            Field::Os => "os",
            Field::Sla => "sla",
            Field::Dr => "dr",
            Field::DrHardware => "dr_hardware",
            Field::Pacemaker => "pacemaker",
            Field::Phase => "phase",
            Field::Server => "server",
        }
    }

    /// Human label as it appears on quote documents.
    pub fn label(self) -> &'static str {
        match self {
            Field::Amount => "Amount",
            Field::Service => "Service",
            Field::Database => "Database",
            Field::TierName => "Tier-Name",
            Field::TierType => "Tier Type",
            Field::Ram => "RAM",
            Field::HanaNodes => "No. of add HANA nodes",
            Field::StandbyNodes => "No. of Standby nodes",
            Field::Storage => "Storage Information",
            Field::Os => "OS",
            Field::Sla => "SLA",
            Field::Dr => "DR",
            Field::DrHardware => "Add HW for DR",
            Field::Pacemaker => "Pacemaker Included",
            Field::Phase => "Phase",
            Field::Server => "Server",
        }
    }

    pub fn from_key(key: &str) -> Option<Field> {
        Field::ALL.iter().copied().find(|f| f.key() == key)
    }

    fn description(self) -> &'static str {
        match self.kind() {
            FieldKind::Text => "text as written in the quote",
            FieldKind::Number => "numeric quantity or amount",
            FieldKind::Capacity => "size with unit, e.g. \"512 GB\" or \"10.88 TB\"",
            FieldKind::Percent => "percentage, e.g. \"99.5%\"",
            FieldKind::Count => "integer count",
            FieldKind::Flag => "yes or no",
            FieldKind::Ordinal => "phase number",
        }
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Which key a document label refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Label {
    Name,
    Section,
    Field(Field),
}

/// Resolve a free-form document label ("System Name", "Storage", "HA nodes")
/// to a schema key.
pub fn resolve_label(label: &str) -> Option<Label> {
    let norm: String = label
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    let label = match norm.as_str() {
        "system name" | "system" | "name" | "item" | "line item" | "component" => Label::Name,
        "section" | "category" | "group" => Label::Section,
        "amount" | "quantity" | "qty" | "count" => Label::Field(Field::Amount),
        "service" | "service type" => Label::Field(Field::Service),
        "database" | "db" => Label::Field(Field::Database),
        "tier name" | "tier" => Label::Field(Field::TierName),
        "tier type" => Label::Field(Field::TierType),
        "ram" | "memory" | "ram gb" => Label::Field(Field::Ram),
        "no of add hana nodes" | "hana nodes" | "additional hana nodes" | "add hana nodes" => {
            Label::Field(Field::HanaNodes)
        }
        "no of standby nodes" | "standby nodes" | "standby" => Label::Field(Field::StandbyNodes),
        "storage information" | "storage" | "additional storage" | "disk" | "storage gb" => {
            Label::Field(Field::Storage)
        }
        "os" | "operating system" => Label::Field(Field::Os),
        "sla" | "availability" => Label::Field(Field::Sla),
        "dr" | "disaster recovery" => Label::Field(Field::Dr),
        "add hw for dr" | "dr hardware" | "additional hw for dr" => Label::Field(Field::DrHardware),
        "pacemaker included" | "pacemaker" => Label::Field(Field::Pacemaker),
        "phase" => Label::Field(Field::Phase),
        "server" | "server type" | "instance" => Label::Field(Field::Server),
        _ => return None,
    };
    Some(label)
}

/// One entry of the extraction schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSpec {
    pub field: Field,
    pub kind: FieldKind,
    /// Unit the canonical value is expressed in, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

/// The expected shape of an extracted line item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionSchema {
    pub fields: Vec<FieldSpec>,
}

impl Default for ExtractionSchema {
    fn default() -> Self {
        Self {
            fields: Field::ALL
                .iter()
                .map(|&field| FieldSpec {
                    field,
                    kind: field.kind(),
                    unit: match field.kind() {
                        FieldKind::Capacity => Some("GB".into()),
                        FieldKind::Percent => Some("%".into()),
                        _ => None,
                    },
                })
                .collect(),
        }
    }
}

impl ExtractionSchema {
    pub fn contains(&self, field: Field) -> bool {
        self.fields.iter().any(|s| s.field == field)
    }

    /// JSON Schema for structured-output LLM calls. Every value is requested
    /// as a string; typing happens in the normalizer.
    pub fn to_json_schema(&self) -> serde_json::Value {
        let mut properties = serde_json::Map::new();
        properties.insert(
            "name".into(),
            serde_json::json!({"type": "string", "description": "System Name of the line item"}),
        );
        properties.insert(
            "section".into(),
            serde_json::json!({"type": "string", "description": "Heading or category the item is listed under"}),
        );
        for spec in &self.fields {
            properties.insert(
                spec.field.key().into(),
                serde_json::json!({
                    "type": "string",
                    "description": format!("{}: {}", spec.field.label(), spec.field.description()),
                }),
            );
        }

        serde_json::json!({
            "type": "object",
            "additionalProperties": false,
            "required": ["name"],
            "properties": properties,
        })
    }
}
