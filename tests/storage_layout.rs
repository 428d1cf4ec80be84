//! Storage layout reports built from definitions files.

use pretty_assertions::assert_eq;
use serde_json::{Value, json};

use solty::config::Definitions;
use solty::layout::StorageLayout;

const VAULT: &str = r#"
[[struct]]
name = "Position"
members = [
    { name = "amount", type = "uint128" },
    { name = "since", type = "uint64" },
    { name = "open", type = "bool" },
    { name = "tags", type = "bytes32[]" },
]

[[enum]]
name = "Status"
values = ["Active", "Frozen", "Closed"]

[[contract]]
name = "Owned"
variables = [{ name = "owner", type = "address" }]

[[contract]]
name = "Vault"
bases = ["Owned"]
variables = [
    { name = "status", type = "Status" },
    { name = "FEE", type = "uint256", constant = true },
    { name = "positions", type = "mapping(address => Position)" },
    { name = "history", type = "uint16[20]" },
    { name = "name", type = "string" },
    { name = "last", type = "Position" },
]
"#;

fn vault() -> Result<StorageLayout, anyhow::Error> {
    let reg = Definitions::from_str(VAULT)?.build_registry()?;
    let id = reg
        .lookup("Vault")
        .ok_or_else(|| anyhow::anyhow!("Vault not declared"))?;
    Ok(StorageLayout::for_contract(&reg, id)?)
}

#[test]
fn test_state_variable_slots() -> Result<(), anyhow::Error> {
    let layout = vault()?;
    let rows: Vec<(&str, &str, &str, u8)> = layout
        .storage
        .iter()
        .map(|e| (e.contract.as_str(), e.label.as_str(), e.slot.as_str(), e.offset))
        .collect();
    assert_eq!(
        rows,
        vec![
            ("Owned", "owner", "0", 0),
            ("Vault", "status", "0", 20),
            ("Vault", "positions", "1", 0),
            ("Vault", "history", "2", 0),
            ("Vault", "name", "4", 0),
            ("Vault", "last", "5", 0),
        ]
    );
    Ok(())
}

#[test]
fn test_type_descriptions() -> Result<(), anyhow::Error> {
    let layout = vault()?;
    let types: Value = serde_json::to_value(&layout.types)?;

    assert_eq!(
        types["t_enum$_Status_$1"],
        json!({ "encoding": "inplace", "label": "Status", "numberOfBytes": "1" })
    );
    assert_eq!(
        types["t_array$_t_uint16_$20_storage"],
        json!({
            "encoding": "inplace",
            "label": "uint16[20]",
            "numberOfBytes": "64",
            "base": "t_uint16",
        })
    );
    assert_eq!(types["t_string_storage"]["encoding"], json!("bytes"));
    assert_eq!(
        types["t_mapping$_t_address_$_t_struct$_Position_$0_storage_$"]["value"],
        json!("t_struct$_Position_$0_storage")
    );

    let position = &types["t_struct$_Position_$0_storage"];
    assert_eq!(position["numberOfBytes"], json!("64"));
    assert_eq!(
        position["members"],
        json!([
            { "label": "amount", "contract": "Position", "slot": "0", "offset": 0, "type": "t_uint128" },
            { "label": "since", "contract": "Position", "slot": "0", "offset": 16, "type": "t_uint64" },
            { "label": "open", "contract": "Position", "slot": "0", "offset": 24, "type": "t_bool" },
            { "label": "tags", "contract": "Position", "slot": "1", "offset": 0, "type": "t_array$_t_bytes32_$dyn_storage" },
        ])
    );
    assert_eq!(types["t_array$_t_bytes32_$dyn_storage"]["encoding"], json!("dynamic_array"));
    assert_eq!(types["t_bytes32"]["numberOfBytes"], json!("32"));
    Ok(())
}

#[test]
fn test_report_serializes_storage_and_types() -> Result<(), anyhow::Error> {
    let layout = vault()?;
    let value: Value = serde_json::from_str(&layout.to_json()?)?;
    let storage = value["storage"].as_array().map(Vec::len);
    assert_eq!(storage, Some(6));
    assert_eq!(value["storage"][1]["type"], json!("t_enum$_Status_$1"));
    assert!(value["types"].as_object().is_some_and(|t| t.contains_key("t_address")));
    Ok(())
}

#[test]
fn test_unknown_member_type_is_reported() {
    let defs = Definitions::from_str(
        r#"
[[contract]]
name = "Broken"
variables = [{ name = "x", type = "Missing" }]
"#,
    )
    .unwrap();
    let err = defs.build_registry().unwrap_err();
    assert_eq!(err.to_string(), "Invalid type name 'Missing': Unknown type 'Missing'");
}
