//! Raw and decoded events, fee filtering, and stakeholder derivation.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::codec;
use crate::config::ConversionOptions;
use crate::error::ConversionError;
use crate::types::{Address, Value};

/// Type-id suffix of the event emitted when a transaction fee is charged.
pub const FEES_DEDUCTED: &str = "FlowFees.FeesDeducted";

const WITHDRAWN: &[&str] = &["FlowToken.TokensWithdrawn", "FungibleToken.Withdrawn"];
const DEPOSITED: &[&str] = &["FlowToken.TokensDeposited", "FungibleToken.Deposited"];

/// An undecoded event as returned by the access API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEvent {
    /// Fully qualified type id, e.g. `A.1654653399040a61.FlowToken.TokensDeposited`.
    pub event_type: String,
    pub transaction_id: String,
    pub transaction_index: u32,
    pub event_index: u32,
    /// JSON-Cadence encoded event value.
    pub payload: Vec<u8>,
}

/// A decoded event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub event_type: String,
    pub transaction_id: String,
    pub transaction_index: u32,
    pub event_index: u32,
    pub fields: IndexMap<String, Value>,
}

impl Event {
    /// Decode one raw event. The payload must be a composite value.
    pub fn decode(raw: &RawEvent, options: &ConversionOptions) -> Result<Self, ConversionError> {
        let fields = match codec::decode(&raw.payload, options)? {
            Value::Composite(c) => c.fields,
            other => {
                return Err(ConversionError::InvalidValue {
                    type_name: raw.event_type.clone(),
                    reason: format!("event payload is a {}", other.kind()),
                })
            }
        };
        Ok(Self {
            event_type: raw.event_type.clone(),
            transaction_id: raw.transaction_id.clone(),
            transaction_index: raw.transaction_index,
            event_index: raw.event_index,
            fields,
        })
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Returns `true` if the type id ends with `suffix` (`Contract.Event`).
    pub fn is(&self, suffix: &str) -> bool {
        self.event_type.ends_with(suffix)
    }

    /// Read a numeric field. Absent fields yield `None`; present fields of
    /// any other shape are a [`ConversionError`].
    pub fn numeric_field(&self, name: &str) -> Result<Option<f64>, ConversionError> {
        match self.fields.get(name) {
            None => Ok(None),
            Some(v) => v.as_f64().map(Some).ok_or_else(|| ConversionError::NonNumericField {
                event: self.event_type.clone(),
                field: name.to_string(),
                found: v.kind().to_string(),
            }),
        }
    }

    fn amount_is(&self, amount: f64) -> bool {
        self.field("amount")
            .and_then(Value::as_f64)
            .is_some_and(|a| (a - amount).abs() < f64::EPSILON)
    }

    fn address_field(&self, name: &str) -> Option<Address> {
        self.field(name).and_then(Value::as_address)
    }
}

// ─── Stakeholders ─────────────────────────────────────────────────────────────

/// Addresses involved in a transaction, each with its roles in discovery order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Stakeholders(IndexMap<String, Vec<String>>);

impl Stakeholders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `role` to `address`, seeding the entry if needed. A role
    /// already held is not repeated.
    pub fn add(&mut self, address: &Address, role: impl Into<String>) {
        let role = role.into();
        let roles = self.0.entry(address.to_string()).or_default();
        if !roles.contains(&role) {
            roles.push(role);
        }
    }

    /// Roles of a canonical `0x…` address.
    pub fn roles(&self, address: &str) -> Option<&[String]> {
        self.0.get(address).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

// ─── Events ───────────────────────────────────────────────────────────────────

/// Decoded events grouped by type id, in order of first appearance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Events(IndexMap<String, Vec<Event>>);

impl Events {
    /// Decode and group raw events.
    pub fn decode(raw: &[RawEvent], options: &ConversionOptions) -> Result<Self, ConversionError> {
        let mut groups: IndexMap<String, Vec<Event>> = IndexMap::new();
        for r in raw {
            let event = Event::decode(r, options)?;
            groups.entry(event.event_type.clone()).or_default().push(event);
        }
        Ok(Self(groups))
    }

    /// The fee event, if the transaction was charged one.
    pub fn fee(&self) -> Option<&Event> {
        self.0
            .iter()
            .find(|(event_type, _)| event_type.ends_with(FEES_DEDUCTED))
            .and_then(|(_, events)| events.first())
    }

    /// Drop the fee event together with the withdrawal of `fee` from `payer`
    /// and its deposit into `fee_receiver`. At most one withdrawal and one
    /// deposit are removed per token family, so a fee reported by both
    /// `FlowToken` and `FungibleToken` events is dropped from each.
    pub fn without_fees(&self, fee: f64, payer: &Address, fee_receiver: &Address) -> Events {
        let mut withdrawal_removed = [fee == 0.0; WITHDRAWN.len()];
        let mut deposit_removed = [fee == 0.0; DEPOSITED.len()];
        let mut groups = IndexMap::new();

        for (event_type, events) in &self.0 {
            if event_type.ends_with(FEES_DEDUCTED) {
                continue;
            }
            let kept: Vec<Event> = events
                .iter()
                .filter(|e| {
                    if let Some(family) = WITHDRAWN.iter().position(|s| e.is(s)) {
                        if !withdrawal_removed[family]
                            && e.amount_is(fee)
                            && e.address_field("from").as_ref() == Some(payer)
                        {
                            withdrawal_removed[family] = true;
                            return false;
                        }
                    }
                    if let Some(family) = DEPOSITED.iter().position(|s| e.is(s)) {
                        if !deposit_removed[family]
                            && e.amount_is(fee)
                            && e.address_field("to").as_ref() == Some(fee_receiver)
                        {
                            deposit_removed[family] = true;
                            return false;
                        }
                    }
                    true
                })
                .cloned()
                .collect();
            if !kept.is_empty() {
                groups.insert(event_type.clone(), kept);
            }
        }
        Events(groups)
    }

    /// Extend `seed` with every address found in an event field. The role is
    /// `<event type>/<field name>`.
    pub fn stakeholders(&self, mut seed: Stakeholders) -> Stakeholders {
        for (event_type, events) in &self.0 {
            for event in events {
                for (name, value) in &event.fields {
                    if let Some(address) = value.as_address() {
                        seed.add(&address, format!("{event_type}/{name}"));
                    }
                }
            }
        }
        seed
    }

    /// All events in group order, then emission order.
    pub fn flatten(&self) -> Vec<Event> {
        self.0.values().flatten().cloned().collect()
    }

    pub fn get(&self, event_type: &str) -> Option<&[Event]> {
        self.0.get(event_type).map(Vec::as_slice)
    }

    /// Number of distinct event types.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Total number of events across all types.
    pub fn event_count(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const PAYER: &str = "0x01cf0e2f2f715450";
    const FEES: &str = "0xf919ee77447b7497";

    fn raw(event_type: &str, fields: serde_json::Value, index: u32) -> RawEvent {
        let payload = json!({
            "type": "Event",
            "value": {"id": event_type, "fields": fields},
        });
        RawEvent {
            event_type: event_type.to_string(),
            transaction_id: "tx1".into(),
            transaction_index: 0,
            event_index: index,
            payload: serde_json::to_vec(&payload).unwrap(),
        }
    }

    fn ufix(v: &str) -> serde_json::Value {
        json!({"type": "UFix64", "value": v})
    }

    fn opt_addr(a: &str) -> serde_json::Value {
        json!({"type": "Optional", "value": {"type": "Address", "value": a}})
    }

    fn fee_transfer_events() -> Vec<RawEvent> {
        vec![
            raw(
                "A.1654653399040a61.FlowToken.TokensWithdrawn",
                json!([{"name": "amount", "value": ufix("0.00001000")}, {"name": "from", "value": opt_addr(PAYER)}]),
                0,
            ),
            raw(
                "A.1654653399040a61.FlowToken.TokensDeposited",
                json!([{"name": "amount", "value": ufix("0.00001000")}, {"name": "to", "value": opt_addr(FEES)}]),
                1,
            ),
            raw(
                "A.f919ee77447b7497.FlowFees.FeesDeducted",
                json!([
                    {"name": "amount", "value": ufix("0.00001000")},
                    {"name": "inclusionEffort", "value": ufix("1.00000000")},
                    {"name": "executionEffort", "value": ufix("0.00000010")}
                ]),
                2,
            ),
        ]
    }

    #[test]
    fn groups_by_type() {
        let mut raws = fee_transfer_events();
        raws.push(raw(
            "A.1654653399040a61.FlowToken.TokensWithdrawn",
            json!([{"name": "amount", "value": ufix("5.0")}, {"name": "from", "value": opt_addr(PAYER)}]),
            3,
        ));
        let events = Events::decode(&raws, &ConversionOptions::default()).unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events.event_count(), 4);
        assert_eq!(events.get("A.1654653399040a61.FlowToken.TokensWithdrawn").unwrap().len(), 2);
    }

    #[test]
    fn finds_fee_event() {
        let events = Events::decode(&fee_transfer_events(), &ConversionOptions::default()).unwrap();
        let fee = events.fee().unwrap();
        assert_eq!(fee.numeric_field("amount").unwrap(), Some(0.00001));
        assert_eq!(fee.numeric_field("missing").unwrap(), None);
    }

    #[test]
    fn non_numeric_field_is_an_error() {
        let raws = vec![raw(
            "A.f919ee77447b7497.FlowFees.FeesDeducted",
            json!([{"name": "amount", "value": {"type": "String", "value": "lots"}}]),
            0,
        )];
        let events = Events::decode(&raws, &ConversionOptions::default()).unwrap();
        let err = events.fee().unwrap().numeric_field("amount").unwrap_err();
        assert!(matches!(err, ConversionError::NonNumericField { .. }));
    }

    #[test]
    fn removes_exactly_the_fee_transfer() {
        let mut raws = fee_transfer_events();
        // An unrelated transfer of the same amount to someone else survives.
        raws.push(raw(
            "A.1654653399040a61.FlowToken.TokensDeposited",
            json!([{"name": "amount", "value": ufix("0.00001000")}, {"name": "to", "value": opt_addr("0x0000000000000002")}]),
            3,
        ));
        let events = Events::decode(&raws, &ConversionOptions::default()).unwrap();
        let payer = Address::from_hex(PAYER).unwrap();
        let fees = Address::from_hex(FEES).unwrap();

        let filtered = events.without_fees(0.00001, &payer, &fees);
        let remaining = filtered.flatten();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].event_index, 3);
        assert!(filtered.fee().is_none());
    }

    #[test]
    fn stakeholders_from_event_fields() {
        let events = Events::decode(&fee_transfer_events(), &ConversionOptions::default()).unwrap();
        let payer = Address::from_hex(PAYER).unwrap();
        let mut seed = Stakeholders::new();
        seed.add(&payer, "payer");

        let holders = events.stakeholders(seed);
        assert_eq!(
            holders.roles(PAYER).unwrap(),
            ["payer", "A.1654653399040a61.FlowToken.TokensWithdrawn/from"]
        );
        assert_eq!(
            holders.roles(FEES).unwrap(),
            ["A.1654653399040a61.FlowToken.TokensDeposited/to"]
        );
    }
}
