use elm_generator::ir::{ElementType, ElmRef, FieldType, Module};
use elm_generator::{Config, build_modules, build_modules_from_protos};
use parser::parse_proto_files;
use pretty_assertions::assert_eq;

const FILES: [&str; 3] = [
    "tests/resources/money.proto",
    "tests/resources/invoice.proto",
    "tests/resources/invoice_extra.proto",
];

fn modules(config: &Config) -> Vec<Module> {
    build_modules_from_protos(&FILES, config)
        .expect("Failed to parse protos")
        .into_iter()
        .collect::<Result<_, _>>()
        .expect("Failed to build modules")
}

#[test]
fn one_module_per_package() {
    let modules = modules(&Config::default());
    let names: Vec<&str> = modules.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["Common.Money", "Billing"]);

    // Both billing files land in one module.
    let billing = &modules[1];
    let records: Vec<&str> = billing.records.iter().map(|r| r.ty.id.id.as_str()).collect();
    assert_eq!(records, vec!["Invoice", "Receipt"]);
    let receipt = billing.record("Receipt").unwrap();
    match &receipt.fields[0].field_type {
        FieldType::Single(ElementType::Named(derived)) => {
            assert_eq!(derived.id, ElmRef::local("Invoice"));
        }
        other => panic!("unexpected field type {other:?}"),
    }
}

#[test]
fn foreign_types_are_qualified_and_imported() {
    let modules = modules(&Config::default());
    let billing = &modules[1];
    assert_eq!(billing.imports, vec!["Common.Money".to_string()]);

    let invoice = billing.record("Invoice").unwrap();
    let FieldType::Single(ElementType::Named(total)) = &invoice.field("total").unwrap().field_type
    else {
        panic!("total should be a named type");
    };
    assert_eq!(total.id.to_string(), "Common.Money.Amount");
    assert_eq!(total.zero.to_string(), "Common.Money.emptyAmount");
    assert_eq!(total.decoder.to_string(), "Common.Money.amountDecoder");
    assert_eq!(total.encoder.to_string(), "Common.Money.amountEncoder");
    assert_eq!(total.fuzzer.to_string(), "Common.Money.amountFuzzer");

    // The foreign module names its own types the same way.
    let money = &modules[0];
    assert_eq!(money.record("Amount").unwrap().ty.decoder.id, "amountDecoder");
    assert!(money.union("Rounding").is_some());

    match &invoice.field("lines").unwrap().field_type {
        FieldType::List(ElementType::Named(line)) => {
            assert_eq!(line.id.module.as_deref(), Some("Common.Money"));
        }
        other => panic!("unexpected field type {other:?}"),
    }
    match &invoice.field("rounding").unwrap().field_type {
        FieldType::Single(ElementType::Named(rounding)) => {
            assert_eq!(rounding.id.to_string(), "Common.Money.Rounding");
        }
        other => panic!("unexpected field type {other:?}"),
    }

    // Foreign names are never claimed locally.
    assert!(!billing.local_ids().contains(&"Amount"));
}

#[test]
fn rpc_types_can_be_foreign() {
    let modules = modules(&Config::default());
    let billing = &modules[1];
    let charge = &billing.services[0].methods[0];
    assert_eq!(charge.id.id, "billingCharge");
    assert_eq!(charge.input.id, ElmRef::local("Invoice"));
    assert_eq!(charge.output.id.to_string(), "Common.Money.Amount");
}

#[test]
fn module_prefix_reaches_foreign_references() {
    let config = Config {
        module_prefix: "Proto".into(),
        ..Config::default()
    };
    let modules = modules(&config);
    assert_eq!(modules[1].name, "Proto.Billing");
    assert_eq!(modules[1].path, "Proto/Billing.elm");
    assert_eq!(modules[1].imports, vec!["Proto.Common.Money".to_string()]);
}

#[test]
fn failures_stay_with_their_package() {
    let mut models = parse_proto_files(&FILES).expect("Failed to parse protos");
    // `AMOUNT` and `Amount` both case to the same Elm type.
    models[0].enums[0].name = "AMOUNT".into();
    models[0].enums[0].full_name = "common.money.AMOUNT".into();

    let results = build_modules(&models, &Config::default());
    assert_eq!(results.len(), 2);
    assert!(results[0].is_err());
    assert!(results[1].is_ok());
}
