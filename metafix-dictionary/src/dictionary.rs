//! Core dictionary implementation and data structures.
//!
//! This module provides the protocol model consumed by the codec:
//! - `Field`, `Component`, `Group` and `MessageTemplate` definitions
//! - `Member`, the usage of a definition inside a template
//! - `Protocol`, the read-only aggregate with its lookup tables
//! - `ProtocolBuilder`, the validating in-memory construction API

use std::{
    collections::{HashMap, HashSet},
    fmt,
    str::FromStr,
    sync::Arc,
};


/// Value types a field may carry on the wire.
///
/// The set is fixed; every field descriptor names exactly one of these and
/// the codec dispatches its converters on it.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ValueType {
    Int,
    SeqNum,
    NumInGroup,
    Length,
    Float,
    Qty,
    Price,
    PriceOffset,
    Amt,
    Char,
    String,
    Currency,
    Exchange,
    Boolean,
    MultipleValueString,
    UtcTimestamp,
    UtcTimeOnly,
    LocalMktDate,
    UtcDate,
    MonthYear,
    DayOfMonth,
}

impl ValueType {
    /// All value types, in dictionary-source order.
    pub const ALL: &'static [ValueType] = &[
        ValueType::Int,
        ValueType::SeqNum,
        ValueType::NumInGroup,
        ValueType::Length,
        ValueType::Float,
        ValueType::Qty,
        ValueType::Price,
        ValueType::PriceOffset,
        ValueType::Amt,
        ValueType::Char,
        ValueType::String,
        ValueType::Currency,
        ValueType::Exchange,
        ValueType::Boolean,
        ValueType::MultipleValueString,
        ValueType::UtcTimestamp,
        ValueType::UtcTimeOnly,
        ValueType::LocalMktDate,
        ValueType::UtcDate,
        ValueType::MonthYear,
        ValueType::DayOfMonth,
    ];

    /// The spelling used by dictionary source files ("INT", "UTCTIMESTAMP", ...).
    pub fn wire_name(&self) -> &'static str {
        match self {
            ValueType::Int => "INT",
            ValueType::SeqNum => "SEQNUM",
            ValueType::NumInGroup => "NUMINGROUP",
            ValueType::Length => "LENGTH",
            ValueType::Float => "FLOAT",
            ValueType::Qty => "QTY",
            ValueType::Price => "PRICE",
            ValueType::PriceOffset => "PRICEOFFSET",
            ValueType::Amt => "AMT",
            ValueType::Char => "CHAR",
            ValueType::String => "STRING",
            ValueType::Currency => "CURRENCY",
            ValueType::Exchange => "EXCHANGE",
            ValueType::Boolean => "BOOLEAN",
            ValueType::MultipleValueString => "MULTIPLEVALUESTRING",
            ValueType::UtcTimestamp => "UTCTIMESTAMP",
            ValueType::UtcTimeOnly => "UTCTIMEONLY",
            ValueType::LocalMktDate => "LOCALMKTDATE",
            ValueType::UtcDate => "UTCDATE",
            ValueType::MonthYear => "MONTHYEAR",
            ValueType::DayOfMonth => "DAYOFMONTH",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

impl FromStr for ValueType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<ValueType, ValidationError> {
        ValueType::ALL
            .iter()
            .find(|value_type| value_type.wire_name() == s)
            .copied()
            .ok_or_else(|| ValidationError::UnknownValueType(s.to_owned()))
    }
}

/// Errors related to dictionary structure and content validation.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    /// Referenced field was not found in the dictionary
    #[error("unknown field {0}")]
    UnknownField(String),

    /// Referenced component was not found in the dictionary
    #[error("unknown component {0}")]
    UnknownComponent(String),

    /// A value type name not present in the fixed enumeration
    #[error("unknown value type {0}")]
    UnknownValueType(String),

    /// A field with the same name already exists in the dictionary
    #[error("duplicated field {0}")]
    DuplicatedField(String),

    /// A field with the same tag already exists in the dictionary
    #[error("duplicated tag {tag} in field {name}")]
    DuplicatedTag { name: String, tag: String },

    /// A component with the same name already exists in the dictionary
    #[error("duplicated component {0}")]
    DuplicatedComponent(String),

    /// The same member name appears twice within one template level
    #[error("duplicated member {0}")]
    DuplicatedMember(String),

    /// A message with the same name already exists in the dictionary
    #[error("duplicated message name {0}")]
    DuplicatedMessageName(String),

    /// A message with the same type already exists in the dictionary
    #[error("duplicated message type {0}")]
    DuplicatedMessageType(String),

    /// Component or group has no members defined
    #[error("component/group {0} has no members")]
    EmptyContainer(String),

    /// Message has no fields, groups or components defined
    #[error("message {0} has no members")]
    EmptyMessage(String),

    /// Component definitions reference each other in a loop
    #[error("circular reference found: {0}")]
    CircularReference(String),
}

/// A single field definition.
///
/// The tag is held in its ASCII decimal byte form because that is the form
/// it is compared and emitted in on the wire. An optional enum dictionary
/// maps wire codes to symbolic names; the reverse map is materialized once
/// at construction.
#[derive(Debug)]
pub struct Field {
    name: String,
    tag: Vec<u8>,
    value_type: ValueType,
    values: Option<HashMap<Vec<u8>, String>>,
    values_by_name: Option<HashMap<String, Vec<u8>>>,
}

impl Field {
    pub fn new(name: &str, tag: u16, value_type: ValueType) -> Field {
        Field {
            name: name.to_owned(),
            tag: tag.to_string().into_bytes(),
            value_type,
            values: None,
            values_by_name: None,
        }
    }

    /// A field with an enum dictionary, given as (wire code, symbolic name)
    /// pairs.
    pub fn with_values<'a, I>(name: &str, tag: u16, value_type: ValueType, values: I) -> Field
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let values: HashMap<Vec<u8>, String> = values
            .into_iter()
            .map(|(code, symbol)| (code.as_bytes().to_vec(), symbol.to_owned()))
            .collect();
        let values_by_name = values
            .iter()
            .map(|(code, symbol)| (symbol.clone(), code.clone()))
            .collect();
        Field {
            name: name.to_owned(),
            tag: tag.to_string().into_bytes(),
            value_type,
            values: Some(values),
            values_by_name: Some(values_by_name),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The tag in its ASCII decimal byte form, e.g. `b"35"`.
    pub fn tag(&self) -> &[u8] {
        &self.tag
    }

    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    pub fn has_values(&self) -> bool {
        self.values.is_some()
    }

    /// Maps a wire code to its symbolic name, if the field has an enum
    /// dictionary and the code is a registered member.
    pub fn decode_enum(&self, code: &[u8]) -> Option<&str> {
        self.values
            .as_ref()
            .and_then(|values| values.get(code))
            .map(String::as_str)
    }

    /// Maps a symbolic name back to its wire code.
    pub fn encode_enum(&self, symbol: &str) -> Option<&[u8]> {
        self.values_by_name
            .as_ref()
            .and_then(|values| values.get(symbol))
            .map(Vec::as_slice)
    }
}

/// The shared definition of a field, component or group.
///
/// Definitions are wrapped in `Arc` because components and groups are
/// defined once but referenced from many message templates; sharing keeps
/// the built protocol `Send + Sync`.
#[derive(Clone, Debug)]
pub enum MemberDefinition {
    Field(Arc<Field>),
    Component(Arc<Component>),
    Group(Arc<Group>),
}

impl MemberDefinition {
    pub fn name(&self) -> &str {
        match self {
            MemberDefinition::Field(field) => field.name(),
            MemberDefinition::Component(component) => component.name(),
            MemberDefinition::Group(group) => group.name(),
        }
    }
}

/// A member reference within a message, component or group.
///
/// The definition is shared; the `required` flag is per usage, so the same
/// component can be mandatory in one message and optional in another.
#[derive(Clone, Debug)]
pub struct Member {
    required: bool,
    definition: MemberDefinition,
}

impl Member {
    pub fn definition(&self) -> &MemberDefinition {
        &self.definition
    }

    pub fn required(&self) -> bool {
        self.required
    }

    pub fn name(&self) -> &str {
        self.definition.name()
    }

    pub fn as_field(&self) -> Option<&Field> {
        match &self.definition {
            MemberDefinition::Field(field) => Some(field),
            _ => None,
        }
    }

    pub fn as_component(&self) -> Option<&Component> {
        match &self.definition {
            MemberDefinition::Component(component) => Some(component),
            _ => None,
        }
    }

    pub fn as_group(&self) -> Option<&Group> {
        match &self.definition {
            MemberDefinition::Group(group) => Some(group),
            _ => None,
        }
    }
}

/// A repeating group: a count field followed by that many ordered
/// occurrences of the child template.
///
/// Groups are keyed in message payloads by the count field's name; the
/// occurrence list is the payload value and the count is recomputed from
/// its length on encode.
#[derive(Debug)]
pub struct Group {
    num_in_group: Arc<Field>,
    members: Vec<Member>,
}

impl Group {
    /// The group's name is the name of its count field.
    pub fn name(&self) -> &str {
        self.num_in_group.name()
    }

    /// The count field announcing the number of occurrences.
    pub fn num_in_group(&self) -> &Field {
        &self.num_in_group
    }

    /// The ordered members defining one occurrence.
    pub fn members(&self) -> &[Member] {
        &self.members
    }
}

/// A reusable, purely syntactic collection of members.
///
/// Components never appear on the wire; traversal inlines their members in
/// declaration order.
#[derive(Debug)]
pub struct Component {
    name: String,
    members: Vec<Member>,
}

impl Component {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn members(&self) -> &[Member] {
        &self.members
    }
}

/// A message template: name, wire type code, category and body members.
#[derive(Debug)]
pub struct MessageTemplate {
    name: String,
    msg_type: Vec<u8>,
    category: String,
    members: Vec<Member>,
}

impl MessageTemplate {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The wire message-type code, e.g. `b"D"`.
    pub fn msg_type(&self) -> &[u8] {
        &self.msg_type
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn members(&self) -> &[Member] {
        &self.members
    }
}

/// A field or group leaf produced by flattening a member list.
///
/// Components are expanded away; what remains is exactly the sequence of
/// wire-visible members in declaration order.
#[derive(Clone, Copy, Debug)]
pub enum FlatMember<'a> {
    Field { field: &'a Field, required: bool },
    Group { group: &'a Group, required: bool },
}

impl<'a> FlatMember<'a> {
    /// The field this leaf is keyed by on the wire; for a group that is its
    /// count field.
    pub fn field(&self) -> &'a Field {
        match self {
            FlatMember::Field { field, .. } => field,
            FlatMember::Group { group, .. } => group.num_in_group(),
        }
    }

    pub fn required(&self) -> bool {
        match self {
            FlatMember::Field { required, .. } | FlatMember::Group { required, .. } => *required,
        }
    }
}

/// Expands component members in place, yielding field and group leaves in
/// declaration order.
pub fn flat_members(members: &[Member]) -> Vec<FlatMember<'_>> {
    let mut flattened = Vec::with_capacity(members.len());
    collect_flat(members, &mut flattened);
    flattened
}

fn collect_flat<'a>(members: &'a [Member], out: &mut Vec<FlatMember<'a>>) {
    for member in members {
        match member.definition() {
            MemberDefinition::Field(field) => out.push(FlatMember::Field {
                field: field.as_ref(),
                required: member.required(),
            }),
            MemberDefinition::Group(group) => out.push(FlatMember::Group {
                group: group.as_ref(),
                required: member.required(),
            }),
            MemberDefinition::Component(component) => collect_flat(component.members(), out),
        }
    }
}

/// Conversion knobs consumed by the codec.
#[derive(Clone, Debug)]
pub struct ProtocolOptions {
    /// Time-bearing value types use the millisecond wire format.
    pub is_millisecond_time: bool,
    /// Decimal value types decode to arbitrary precision decimals rather
    /// than binary floats.
    pub is_float_decimal: bool,
    is_type_enum: HashMap<ValueType, bool>,
}

impl ProtocolOptions {
    pub fn new() -> ProtocolOptions {
        ProtocolOptions::default()
    }

    /// Overrides the enum-decode policy for one value type. Types without
    /// an override keep the default (enabled).
    pub fn with_enum_policy(mut self, value_type: ValueType, enabled: bool) -> ProtocolOptions {
        self.is_type_enum.insert(value_type, enabled);
        self
    }

    /// Whether fields of this value type substitute through their enum
    /// dictionary when decoded.
    pub fn is_enum_decoded(&self, value_type: ValueType) -> bool {
        self.is_type_enum.get(&value_type).copied().unwrap_or(true)
    }
}

impl Default for ProtocolOptions {
    fn default() -> ProtocolOptions {
        ProtocolOptions {
            is_millisecond_time: true,
            is_float_decimal: false,
            is_type_enum: HashMap::new(),
        }
    }
}

/// The read-only protocol aggregate.
#[derive(Debug)]
pub struct Protocol {
    version: String,
    begin_string: Vec<u8>,
    fields_by_name: HashMap<String, Arc<Field>>,
    fields_by_tag: HashMap<Vec<u8>, Arc<Field>>,
    components: HashMap<String, Arc<Component>>,
    messages_by_name: HashMap<String, Arc<MessageTemplate>>,
    messages_by_type: HashMap<Vec<u8>, Arc<MessageTemplate>>,
    header: Vec<Member>,
    trailer: Vec<Member>,
    options: ProtocolOptions,
}

impl Protocol {
    pub fn version(&self) -> &str {
        &self.version
    }

    /// The exact `BeginString` bytes, e.g. `b"FIX.4.2"`.
    pub fn begin_string(&self) -> &[u8] {
        &self.begin_string
    }

    pub fn field_by_name(&self, name: &str) -> Option<&Arc<Field>> {
        self.fields_by_name.get(name)
    }

    /// Looks a field up by its ASCII decimal tag bytes.
    pub fn field_by_tag(&self, tag: &[u8]) -> Option<&Arc<Field>> {
        self.fields_by_tag.get(tag)
    }

    pub fn component(&self, name: &str) -> Option<&Arc<Component>> {
        self.components.get(name)
    }

    pub fn message_by_name(&self, name: &str) -> Option<&Arc<MessageTemplate>> {
        self.messages_by_name.get(name)
    }

    /// Looks a message template up by its wire message-type bytes.
    pub fn message_by_type(&self, msg_type: &[u8]) -> Option<&Arc<MessageTemplate>> {
        self.messages_by_type.get(msg_type)
    }

    pub fn header(&self) -> &[Member] {
        &self.header
    }

    pub fn trailer(&self) -> &[Member] {
        &self.trailer
    }

    pub fn options(&self) -> &ProtocolOptions {
        &self.options
    }

    pub fn is_enum_decoded(&self, value_type: ValueType) -> bool {
        self.options.is_enum_decoded(value_type)
    }

    /// Whether `name` is a registered symbolic name of the `MsgType` enum
    /// dictionary.
    pub fn is_valid_message_name(&self, name: &str) -> bool {
        self.fields_by_name
            .get("MsgType")
            .is_some_and(|field| field.encode_enum(name).is_some())
    }
}

/// A raw member declaration handed to the builder; resolution to shared
/// definitions happens in `build()`.
#[derive(Clone, Debug)]
pub enum MemberSpec {
    Field {
        name: String,
        required: bool,
    },
    Component {
        name: String,
        required: bool,
    },
    Group {
        name: String,
        required: bool,
        members: Vec<MemberSpec>,
    },
}

impl MemberSpec {
    pub fn field(name: &str, required: bool) -> MemberSpec {
        MemberSpec::Field {
            name: name.to_owned(),
            required,
        }
    }

    pub fn component(name: &str, required: bool) -> MemberSpec {
        MemberSpec::Component {
            name: name.to_owned(),
            required,
        }
    }

    /// A repeating group declaration; `name` is the count field.
    pub fn group(name: &str, required: bool, members: Vec<MemberSpec>) -> MemberSpec {
        MemberSpec::Group {
            name: name.to_owned(),
            required,
            members,
        }
    }

    fn name(&self) -> &str {
        match self {
            MemberSpec::Field { name, .. }
            | MemberSpec::Component { name, .. }
            | MemberSpec::Group { name, .. } => name,
        }
    }
}

struct RawMessage {
    name: String,
    msg_type: Vec<u8>,
    category: String,
    members: Vec<MemberSpec>,
}

/// Collects raw declarations and validates them into a [`Protocol`].
///
/// Member specs reference fields and components by name; resolution is
/// demand driven, so a component may freely reference another component
/// declared later. Cycles are detected with a visited set.
pub struct ProtocolBuilder {
    version: String,
    begin_string: Vec<u8>,
    fields: Vec<Field>,
    components: Vec<(String, Vec<MemberSpec>)>,
    messages: Vec<RawMessage>,
    header: Vec<MemberSpec>,
    trailer: Vec<MemberSpec>,
    options: ProtocolOptions,
}

impl ProtocolBuilder {
    pub fn new(version: &str, begin_string: &[u8]) -> ProtocolBuilder {
        ProtocolBuilder {
            version: version.to_owned(),
            begin_string: begin_string.to_vec(),
            fields: Vec::new(),
            components: Vec::new(),
            messages: Vec::new(),
            header: Vec::new(),
            trailer: Vec::new(),
            options: ProtocolOptions::default(),
        }
    }

    pub fn field(mut self, field: Field) -> ProtocolBuilder {
        self.fields.push(field);
        self
    }

    pub fn component(mut self, name: &str, members: Vec<MemberSpec>) -> ProtocolBuilder {
        self.components.push((name.to_owned(), members));
        self
    }

    pub fn message(
        mut self,
        name: &str,
        msg_type: &[u8],
        category: &str,
        members: Vec<MemberSpec>,
    ) -> ProtocolBuilder {
        self.messages.push(RawMessage {
            name: name.to_owned(),
            msg_type: msg_type.to_vec(),
            category: category.to_owned(),
            members,
        });
        self
    }

    pub fn header(mut self, members: Vec<MemberSpec>) -> ProtocolBuilder {
        self.header = members;
        self
    }

    pub fn trailer(mut self, members: Vec<MemberSpec>) -> ProtocolBuilder {
        self.trailer = members;
        self
    }

    pub fn options(mut self, options: ProtocolOptions) -> ProtocolBuilder {
        self.options = options;
        self
    }

    pub fn build(self) -> Result<Protocol, ValidationError> {
        let mut db = MembersDb::new(self.fields, self.components)?;

        let mut visited = HashSet::new();
        let header = db.resolve_members(&self.header, &mut visited)?;
        let trailer = db.resolve_members(&self.trailer, &mut visited)?;

        let mut messages_by_name = HashMap::with_capacity(self.messages.len());
        let mut messages_by_type = HashMap::with_capacity(self.messages.len());
        for raw_message in self.messages {
            if raw_message.members.is_empty() {
                return Err(ValidationError::EmptyMessage(raw_message.name));
            }
            let members = db.resolve_members(&raw_message.members, &mut visited)?;
            let message = Arc::new(MessageTemplate {
                name: raw_message.name,
                msg_type: raw_message.msg_type,
                category: raw_message.category,
                members,
            });
            if messages_by_name
                .insert(message.name.clone(), message.clone())
                .is_some()
            {
                return Err(ValidationError::DuplicatedMessageName(message.name.clone()));
            }
            if messages_by_type
                .insert(message.msg_type.clone(), message.clone())
                .is_some()
            {
                return Err(ValidationError::DuplicatedMessageType(
                    String::from_utf8_lossy(&message.msg_type).into_owned(),
                ));
            }
        }

        let mut fields_by_tag = HashMap::with_capacity(db.fields.len());
        for field in db.fields.values() {
            if let Some(duplicate) = fields_by_tag.insert(field.tag.clone(), field.clone()) {
                return Err(ValidationError::DuplicatedTag {
                    name: duplicate.name.clone(),
                    tag: String::from_utf8_lossy(&duplicate.tag).into_owned(),
                });
            }
        }

        Ok(Protocol {
            version: self.version,
            begin_string: self.begin_string,
            fields_by_name: db.fields,
            fields_by_tag,
            components: db.components,
            messages_by_name,
            messages_by_type,
            header,
            trailer,
            options: self.options,
        })
    }
}

struct MembersDb {
    fields: HashMap<String, Arc<Field>>,
    raw_components: HashMap<String, Vec<MemberSpec>>,
    components: HashMap<String, Arc<Component>>,
}

impl MembersDb {
    fn new(
        fields: Vec<Field>,
        raw_components: Vec<(String, Vec<MemberSpec>)>,
    ) -> Result<MembersDb, ValidationError> {
        let mut names = HashSet::new();
        let mut fields_map = HashMap::with_capacity(fields.len());
        for field in fields {
            if !names.insert(field.name.clone()) {
                return Err(ValidationError::DuplicatedField(field.name));
            }
            fields_map.insert(field.name.clone(), Arc::new(field));
        }

        let mut raw_components_map = HashMap::with_capacity(raw_components.len());
        for (name, members) in raw_components {
            if !names.insert(name.clone()) {
                return Err(ValidationError::DuplicatedComponent(name));
            }
            raw_components_map.insert(name, members);
        }

        Ok(MembersDb {
            fields: fields_map,
            raw_components: raw_components_map,
            components: HashMap::new(),
        })
    }

    fn field(&self, name: &str) -> Result<Arc<Field>, ValidationError> {
        self.fields
            .get(name)
            .cloned()
            .ok_or_else(|| ValidationError::UnknownField(name.to_owned()))
    }

    fn resolve_members(
        &mut self,
        specs: &[MemberSpec],
        visited: &mut HashSet<String>,
    ) -> Result<Vec<Member>, ValidationError> {
        let mut seen = HashSet::new();
        let mut members = Vec::with_capacity(specs.len());
        for spec in specs {
            if !seen.insert(spec.name().to_owned()) {
                return Err(ValidationError::DuplicatedMember(spec.name().to_owned()));
            }
            let member = match spec {
                MemberSpec::Field { name, required } => Member {
                    required: *required,
                    definition: MemberDefinition::Field(self.field(name)?),
                },
                MemberSpec::Component { name, required } => Member {
                    required: *required,
                    definition: MemberDefinition::Component(
                        self.resolve_component(name, visited)?,
                    ),
                },
                MemberSpec::Group {
                    name,
                    required,
                    members: children,
                } => {
                    if children.is_empty() {
                        return Err(ValidationError::EmptyContainer(name.clone()));
                    }
                    let num_in_group = self.field(name)?;
                    let children = self.resolve_members(children, visited)?;
                    Member {
                        required: *required,
                        definition: MemberDefinition::Group(Arc::new(Group {
                            num_in_group,
                            members: children,
                        })),
                    }
                }
            };
            members.push(member);
        }
        Ok(members)
    }

    fn resolve_component(
        &mut self,
        name: &str,
        visited: &mut HashSet<String>,
    ) -> Result<Arc<Component>, ValidationError> {
        if let Some(component) = self.components.get(name) {
            return Ok(component.clone());
        }
        if !visited.insert(name.to_owned()) {
            return Err(ValidationError::CircularReference(name.to_owned()));
        }

        let specs = self
            .raw_components
            .remove(name)
            .ok_or_else(|| ValidationError::UnknownComponent(name.to_owned()))?;
        if specs.is_empty() {
            return Err(ValidationError::EmptyContainer(name.to_owned()));
        }

        let members = self.resolve_members(&specs, visited)?;
        visited.remove(name);

        let component = Arc::new(Component {
            name: name.to_owned(),
            members,
        });
        self.components
            .insert(component.name.clone(), component.clone());
        Ok(component)
    }
}
