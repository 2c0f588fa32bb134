//! Auth tree callbacks.
//!
//! Each page of an auth tree carries callbacks: typed prompts the server
//! renders through the client. On the wire a callback is a loose
//! `{type, output, input}` triple; this module keeps that payload intact and
//! layers typed accessors over it, so unmodified fields round-trip back to
//! the server byte-for-byte.
//!
//! Types this client does not recognize become [`Callback::Unknown`] and are
//! submitted unchanged, which keeps the client forward-compatible with trees
//! that use newer callback types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AuthError, Result};

/// A single name/value entry in a callback's `output` or `input` list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub value: Value,
}

/// Raw callback payload as sent by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallbackPayload {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub output: Vec<Field>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub input: Vec<Field>,
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
}

impl CallbackPayload {
    /// Value of the named output entry, when present.
    pub fn output_value(&self, name: &str) -> Option<&Value> {
        self.output.iter().find(|f| f.name == name).map(|f| &f.value)
    }

    /// String value of the named output entry, when present.
    pub fn output_str(&self, name: &str) -> Option<&str> {
        self.output_value(name).and_then(|v| v.as_str())
    }

    /// Set the value of the input entry at `index`.
    fn set_input(&mut self, index: usize, value: Value) -> Result<()> {
        let kind = self.kind.clone();
        let field = self.input.get_mut(index).ok_or_else(|| {
            AuthError::Protocol(format!(
                "callback '{}' has no input slot at index {}",
                kind, index
            ))
        })?;
        field.value = value;
        Ok(())
    }
}

/// A username prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct NameCallback {
    payload: CallbackPayload,
}

impl NameCallback {
    pub fn prompt(&self) -> Option<&str> {
        self.payload.output_str("prompt")
    }

    pub fn set_name(&mut self, name: &str) -> Result<()> {
        self.payload.set_input(0, Value::String(name.to_string()))
    }
}

/// A password prompt. The entered value is write-only.
#[derive(Debug, Clone, PartialEq)]
pub struct PasswordCallback {
    payload: CallbackPayload,
}

impl PasswordCallback {
    pub fn prompt(&self) -> Option<&str> {
        self.payload.output_str("prompt")
    }

    pub fn set_password(&mut self, password: &str) -> Result<()> {
        self.payload
            .set_input(0, Value::String(password.to_string()))
    }
}

/// A single-select choice among server-supplied options.
#[derive(Debug, Clone, PartialEq)]
pub struct ChoiceCallback {
    payload: CallbackPayload,
}

impl ChoiceCallback {
    pub fn prompt(&self) -> Option<&str> {
        self.payload.output_str("prompt")
    }

    pub fn choices(&self) -> Vec<String> {
        self.payload
            .output_value("choices")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn default_choice(&self) -> usize {
        self.payload
            .output_value("defaultChoice")
            .and_then(|v| v.as_u64())
            .unwrap_or(0) as usize
    }

    pub fn set_selected_index(&mut self, index: usize) -> Result<()> {
        let count = self.choices().len();
        if count > 0 && index >= count {
            return Err(AuthError::Protocol(format!(
                "choice index {} out of range, {} choices offered",
                index, count
            )));
        }
        self.payload.set_input(0, Value::from(index as u64))
    }
}

/// A confirmation prompt (e.g. "Try again" / "Cancel").
#[derive(Debug, Clone, PartialEq)]
pub struct ConfirmationCallback {
    payload: CallbackPayload,
}

impl ConfirmationCallback {
    pub fn prompt(&self) -> Option<&str> {
        self.payload.output_str("prompt")
    }

    pub fn options(&self) -> Vec<String> {
        self.payload
            .output_value("options")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn set_selected_index(&mut self, index: usize) -> Result<()> {
        let count = self.options().len();
        if count > 0 && index >= count {
            return Err(AuthError::Protocol(format!(
                "confirmation index {} out of range, {} options offered",
                index, count
            )));
        }
        self.payload.set_input(0, Value::from(index as u64))
    }
}

/// A display-only message from the tree. Has no input.
#[derive(Debug, Clone, PartialEq)]
pub struct TextOutputCallback {
    payload: CallbackPayload,
}

impl TextOutputCallback {
    pub fn message(&self) -> Option<&str> {
        self.payload.output_str("message")
    }

    /// Message type as sent by the server: "0" info, "1" warning, "2" error.
    pub fn message_type(&self) -> Option<&str> {
        self.payload.output_str("messageType")
    }
}

/// A value the tree passes through the client without rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct HiddenValueCallback {
    payload: CallbackPayload,
}

impl HiddenValueCallback {
    pub fn id(&self) -> Option<&str> {
        self.payload.output_str("id")
    }

    pub fn value(&self) -> Option<&str> {
        self.payload.output_str("value")
    }

    pub fn set_value(&mut self, value: &str) -> Result<()> {
        self.payload.set_input(0, Value::String(value.to_string()))
    }
}

/// A profile attribute collected during registration (email, names, ...).
///
/// Unlike [`NameCallback`] this carries the attribute's directory name next
/// to its display prompt; registration trees send one per collected field.
#[derive(Debug, Clone, PartialEq)]
pub struct StringAttributeInputCallback {
    payload: CallbackPayload,
}

impl StringAttributeInputCallback {
    /// Directory attribute name, e.g. `mail` or `givenName`.
    pub fn name(&self) -> Option<&str> {
        self.payload.output_str("name")
    }

    pub fn prompt(&self) -> Option<&str> {
        self.payload.output_str("prompt")
    }

    pub fn required(&self) -> bool {
        self.payload
            .output_value("required")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    /// Server-prefilled value, when the attribute already has one.
    pub fn value(&self) -> Option<&str> {
        self.payload.output_str("value")
    }

    pub fn policies(&self) -> Option<&Value> {
        self.payload.output_value("policies")
    }

    pub fn set_value(&mut self, value: &str) -> Result<()> {
        self.payload.set_input(0, Value::String(value.to_string()))
    }

    /// Ask the server to validate without advancing the tree.
    pub fn set_validate_only(&mut self, validate_only: bool) -> Result<()> {
        self.payload.set_input(1, Value::Bool(validate_only))
    }
}

/// A username prompt checked against server-side creation policies.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedCreateUsernameCallback {
    payload: CallbackPayload,
}

impl ValidatedCreateUsernameCallback {
    pub fn prompt(&self) -> Option<&str> {
        self.payload.output_str("prompt")
    }

    /// Raw policy document the server validates against.
    pub fn policies(&self) -> Option<&Value> {
        self.payload.output_value("policies")
    }

    /// Policies the last submitted value failed, as raw policy entries.
    pub fn failed_policies(&self) -> Vec<String> {
        self.payload
            .output_value("failedPolicies")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn set_username(&mut self, username: &str) -> Result<()> {
        self.payload
            .set_input(0, Value::String(username.to_string()))
    }

    pub fn set_validate_only(&mut self, validate_only: bool) -> Result<()> {
        self.payload.set_input(1, Value::Bool(validate_only))
    }
}

/// A password prompt checked against server-side creation policies.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedCreatePasswordCallback {
    payload: CallbackPayload,
}

impl ValidatedCreatePasswordCallback {
    pub fn prompt(&self) -> Option<&str> {
        self.payload.output_str("prompt")
    }

    /// Whether the entered value should be shown while typing.
    pub fn echo_on(&self) -> bool {
        self.payload
            .output_value("echoOn")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    pub fn policies(&self) -> Option<&Value> {
        self.payload.output_value("policies")
    }

    pub fn failed_policies(&self) -> Vec<String> {
        self.payload
            .output_value("failedPolicies")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn set_password(&mut self, password: &str) -> Result<()> {
        self.payload
            .set_input(0, Value::String(password.to_string()))
    }

    pub fn set_validate_only(&mut self, validate_only: bool) -> Result<()> {
        self.payload.set_input(1, Value::Bool(validate_only))
    }
}

/// Tells the client to wait before re-submitting the node. Has no input.
#[derive(Debug, Clone, PartialEq)]
pub struct PollingWaitCallback {
    payload: CallbackPayload,
}

impl PollingWaitCallback {
    pub fn message(&self) -> Option<&str> {
        self.payload.output_str("message")
    }

    /// Wait interval in milliseconds. The server sends it as a string.
    pub fn wait_time_ms(&self) -> Option<u64> {
        self.payload
            .output_str("waitTime")
            .and_then(|v| v.parse().ok())
    }
}

/// Free-form JSON the tree attaches for the client. Has no input.
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataCallback {
    payload: CallbackPayload,
}

impl MetadataCallback {
    pub fn data(&self) -> Option<&Value> {
        self.payload.output_value("data")
    }
}

/// A typed view over a callback payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Callback {
    Name(NameCallback),
    Password(PasswordCallback),
    Choice(ChoiceCallback),
    Confirmation(ConfirmationCallback),
    TextOutput(TextOutputCallback),
    HiddenValue(HiddenValueCallback),
    StringAttributeInput(StringAttributeInputCallback),
    ValidatedCreateUsername(ValidatedCreateUsernameCallback),
    ValidatedCreatePassword(ValidatedCreatePasswordCallback),
    PollingWait(PollingWaitCallback),
    Metadata(MetadataCallback),
    /// Unrecognized type; the payload is preserved and submitted untouched.
    Unknown(CallbackPayload),
}

impl Callback {
    /// Wrap a raw payload in its typed view.
    pub fn from_payload(payload: CallbackPayload) -> Self {
        match payload.kind.as_str() {
            "NameCallback" => Callback::Name(NameCallback { payload }),
            "PasswordCallback" => Callback::Password(PasswordCallback { payload }),
            "ChoiceCallback" => Callback::Choice(ChoiceCallback { payload }),
            "ConfirmationCallback" => Callback::Confirmation(ConfirmationCallback { payload }),
            "TextOutputCallback" => Callback::TextOutput(TextOutputCallback { payload }),
            "HiddenValueCallback" => Callback::HiddenValue(HiddenValueCallback { payload }),
            "StringAttributeInputCallback" => {
                Callback::StringAttributeInput(StringAttributeInputCallback { payload })
            }
            "ValidatedCreateUsernameCallback" => {
                Callback::ValidatedCreateUsername(ValidatedCreateUsernameCallback { payload })
            }
            "ValidatedCreatePasswordCallback" => {
                Callback::ValidatedCreatePassword(ValidatedCreatePasswordCallback { payload })
            }
            "PollingWaitCallback" => Callback::PollingWait(PollingWaitCallback { payload }),
            "MetadataCallback" => Callback::Metadata(MetadataCallback { payload }),
            _ => Callback::Unknown(payload),
        }
    }

    /// The raw payload, with any values the caller set merged in.
    pub fn into_payload(self) -> CallbackPayload {
        match self {
            Callback::Name(c) => c.payload,
            Callback::Password(c) => c.payload,
            Callback::Choice(c) => c.payload,
            Callback::Confirmation(c) => c.payload,
            Callback::TextOutput(c) => c.payload,
            Callback::HiddenValue(c) => c.payload,
            Callback::StringAttributeInput(c) => c.payload,
            Callback::ValidatedCreateUsername(c) => c.payload,
            Callback::ValidatedCreatePassword(c) => c.payload,
            Callback::PollingWait(c) => c.payload,
            Callback::Metadata(c) => c.payload,
            Callback::Unknown(p) => p,
        }
    }

    /// Wire type string of the underlying payload.
    pub fn kind(&self) -> &str {
        match self {
            Callback::Name(c) => &c.payload.kind,
            Callback::Password(c) => &c.payload.kind,
            Callback::Choice(c) => &c.payload.kind,
            Callback::Confirmation(c) => &c.payload.kind,
            Callback::TextOutput(c) => &c.payload.kind,
            Callback::HiddenValue(c) => &c.payload.kind,
            Callback::StringAttributeInput(c) => &c.payload.kind,
            Callback::ValidatedCreateUsername(c) => &c.payload.kind,
            Callback::ValidatedCreatePassword(c) => &c.payload.kind,
            Callback::PollingWait(c) => &c.payload.kind,
            Callback::Metadata(c) => &c.payload.kind,
            Callback::Unknown(p) => &p.kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name_payload() -> CallbackPayload {
        serde_json::from_str(
            r#"{
                "type": "NameCallback",
                "output": [{"name": "prompt", "value": "User Name"}],
                "input": [{"name": "IDToken1", "value": ""}],
                "_id": 0
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_name_callback_round_trip() {
        let mut callback = match Callback::from_payload(name_payload()) {
            Callback::Name(c) => c,
            other => panic!("expected NameCallback, got {:?}", other),
        };

        assert_eq!(callback.prompt(), Some("User Name"));
        callback.set_name("demo").unwrap();

        let payload = Callback::Name(callback).into_payload();
        assert_eq!(payload.input[0].name, "IDToken1");
        assert_eq!(payload.input[0].value, Value::String("demo".to_string()));
        assert_eq!(payload.id, Some(0));
    }

    #[test]
    fn test_choice_callback_rejects_out_of_range() {
        let payload: CallbackPayload = serde_json::from_str(
            r#"{
                "type": "ChoiceCallback",
                "output": [
                    {"name": "prompt", "value": "Second Factor"},
                    {"name": "choices", "value": ["sms", "email"]},
                    {"name": "defaultChoice", "value": 1}
                ],
                "input": [{"name": "IDToken1", "value": 0}]
            }"#,
        )
        .unwrap();

        let mut callback = match Callback::from_payload(payload) {
            Callback::Choice(c) => c,
            other => panic!("expected ChoiceCallback, got {:?}", other),
        };

        assert_eq!(callback.choices(), vec!["sms", "email"]);
        assert_eq!(callback.default_choice(), 1);
        assert!(callback.set_selected_index(2).is_err());
        callback.set_selected_index(0).unwrap();
    }

    #[test]
    fn test_unknown_callback_preserved() {
        let raw = r#"{
            "type": "WebAuthnRegistrationCallback",
            "output": [{"name": "challenge", "value": "abc123"}],
            "input": [{"name": "IDToken1", "value": ""}]
        }"#;
        let payload: CallbackPayload = serde_json::from_str(raw).unwrap();
        let callback = Callback::from_payload(payload.clone());

        assert!(matches!(callback, Callback::Unknown(_)));
        assert_eq!(callback.into_payload(), payload);
    }

    #[test]
    fn test_text_output_has_no_input() {
        let payload: CallbackPayload = serde_json::from_str(
            r#"{
                "type": "TextOutputCallback",
                "output": [
                    {"name": "message", "value": "Welcome"},
                    {"name": "messageType", "value": "0"}
                ]
            }"#,
        )
        .unwrap();

        let callback = match Callback::from_payload(payload) {
            Callback::TextOutput(c) => c,
            other => panic!("expected TextOutputCallback, got {:?}", other),
        };
        assert_eq!(callback.message(), Some("Welcome"));
        assert_eq!(callback.message_type(), Some("0"));
    }

    #[test]
    fn test_validated_create_username_round_trip() {
        let payload: CallbackPayload = serde_json::from_str(
            r#"{
                "type": "ValidatedCreateUsernameCallback",
                "output": [
                    {"name": "policies", "value": {"name": "userName"}},
                    {"name": "failedPolicies", "value": ["{ \"policyRequirement\": \"UNIQUE\" }"]},
                    {"name": "validateOnly", "value": false},
                    {"name": "prompt", "value": "Username"}
                ],
                "input": [
                    {"name": "IDToken1", "value": ""},
                    {"name": "IDToken1validateOnly", "value": false}
                ],
                "_id": 0
            }"#,
        )
        .unwrap();

        let mut callback = match Callback::from_payload(payload) {
            Callback::ValidatedCreateUsername(c) => c,
            other => panic!("expected ValidatedCreateUsernameCallback, got {:?}", other),
        };

        assert_eq!(callback.prompt(), Some("Username"));
        assert_eq!(callback.policies().and_then(|p| p["name"].as_str()), Some("userName"));
        assert_eq!(callback.failed_policies().len(), 1);
        callback.set_username("tester").unwrap();
        callback.set_validate_only(false).unwrap();

        let payload = Callback::ValidatedCreateUsername(callback).into_payload();
        assert_eq!(payload.input[0].value, Value::String("tester".to_string()));
        assert_eq!(payload.input[1].name, "IDToken1validateOnly");
        assert_eq!(payload.input[1].value, Value::Bool(false));
    }

    #[test]
    fn test_validated_create_password_write_only() {
        let payload: CallbackPayload = serde_json::from_str(
            r#"{
                "type": "ValidatedCreatePasswordCallback",
                "output": [
                    {"name": "echoOn", "value": false},
                    {"name": "policies", "value": {"name": "password"}},
                    {"name": "failedPolicies", "value": []},
                    {"name": "validateOnly", "value": false},
                    {"name": "prompt", "value": "Password"}
                ],
                "input": [
                    {"name": "IDToken1", "value": ""},
                    {"name": "IDToken1validateOnly", "value": false}
                ]
            }"#,
        )
        .unwrap();

        let mut callback = match Callback::from_payload(payload) {
            Callback::ValidatedCreatePassword(c) => c,
            other => panic!("expected ValidatedCreatePasswordCallback, got {:?}", other),
        };

        assert!(!callback.echo_on());
        assert!(callback.failed_policies().is_empty());
        callback.set_password("password").unwrap();

        let payload = Callback::ValidatedCreatePassword(callback).into_payload();
        assert_eq!(payload.input[0].value, Value::String("password".to_string()));
    }

    #[test]
    fn test_string_attribute_input_carries_attribute_name() {
        let payload: CallbackPayload = serde_json::from_str(
            r#"{
                "type": "StringAttributeInputCallback",
                "output": [
                    {"name": "name", "value": "mail"},
                    {"name": "prompt", "value": "Email Address"},
                    {"name": "required", "value": true},
                    {"name": "policies", "value": {}},
                    {"name": "failedPolicies", "value": []},
                    {"name": "validateOnly", "value": false},
                    {"name": "value", "value": ""}
                ],
                "input": [
                    {"name": "IDToken1", "value": ""},
                    {"name": "IDToken1validateOnly", "value": false}
                ]
            }"#,
        )
        .unwrap();

        let mut callback = match Callback::from_payload(payload) {
            Callback::StringAttributeInput(c) => c,
            other => panic!("expected StringAttributeInputCallback, got {:?}", other),
        };

        assert_eq!(callback.name(), Some("mail"));
        assert_eq!(callback.prompt(), Some("Email Address"));
        assert!(callback.required());
        callback.set_value("test@test.com").unwrap();

        let payload = Callback::StringAttributeInput(callback).into_payload();
        assert_eq!(
            payload.input[0].value,
            Value::String("test@test.com".to_string())
        );
    }

    #[test]
    fn test_polling_wait_parses_interval() {
        let payload: CallbackPayload = serde_json::from_str(
            r#"{
                "type": "PollingWaitCallback",
                "output": [
                    {"name": "waitTime", "value": "8000"},
                    {"name": "message", "value": "Waiting for response..."}
                ]
            }"#,
        )
        .unwrap();

        let callback = match Callback::from_payload(payload) {
            Callback::PollingWait(c) => c,
            other => panic!("expected PollingWaitCallback, got {:?}", other),
        };
        assert_eq!(callback.wait_time_ms(), Some(8000));
        assert_eq!(callback.message(), Some("Waiting for response..."));
    }

    #[test]
    fn test_metadata_exposes_raw_data() {
        let payload: CallbackPayload = serde_json::from_str(
            r#"{
                "type": "MetadataCallback",
                "output": [{"name": "data", "value": {"stage": "DeviceBinding"}}]
            }"#,
        )
        .unwrap();

        let callback = match Callback::from_payload(payload) {
            Callback::Metadata(c) => c,
            other => panic!("expected MetadataCallback, got {:?}", other),
        };
        assert_eq!(
            callback.data().and_then(|d| d["stage"].as_str()),
            Some("DeviceBinding")
        );
    }

    #[test]
    fn test_empty_input_not_serialized() {
        let payload: CallbackPayload = serde_json::from_str(
            r#"{"type": "TextOutputCallback", "output": []}"#,
        )
        .unwrap();
        let json = serde_json::to_value(&payload).unwrap();
        assert!(json.get("input").is_none());
        assert!(json.get("_id").is_none());
    }
}
