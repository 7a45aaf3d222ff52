//! Integration tests for the proxy binder.
//!
//! Covers convention resolution (`is`/`get`/`set`), method-before-field
//! candidate order, type-compatibility fallbacks, rename tables, static
//! targets, all-or-nothing binding, and call-time dispatch.

use lockpick::{
    access_static_field, bind_proxy, bind_proxy_renamed, read_field, AccessError, ClassBuilder,
    ClassId, InterfaceBuilder, InterfaceId, ObjRef, ProxyAccessor, RenameTable, Target, Thrown,
    ThrowKind, TypeRegistry, TypeTag, Value, Visibility,
};

struct Fixture {
    registry: TypeRegistry,
    parcel: ClassId,
}

/// Vessel <- Parcel, every member private. Slots: value 0, kind 1, magic 2,
/// ready 3, wrong 4, count 5, ANonStandardBeanField 6.
fn fixture() -> Fixture {
    let mut registry = TypeRegistry::new();
    let vessel = registry
        .register_class(
            ClassBuilder::new("Vessel")
                .field(
                    "value",
                    TypeTag::Int,
                    Visibility::Private,
                    Value::Int(26071973),
                )
                .field("kind", TypeTag::Bool, Visibility::Private, Value::Bool(true))
                .method("getPrivate", &[], TypeTag::Int, Visibility::Private, |recv, _| {
                    Ok(recv.read().fields[0].clone())
                }),
        )
        .unwrap();
    let parcel = registry
        .register_class(
            ClassBuilder::new("Parcel")
                .parent(vessel)
                .field("magic", TypeTag::Bool, Visibility::Private, Value::Bool(true))
                .field("ready", TypeTag::Bool, Visibility::Private, Value::Bool(false))
                .field("wrong", TypeTag::Int, Visibility::Private, Value::Int(0))
                .field("count", TypeTag::Int, Visibility::Private, Value::Int(7))
                .field(
                    "ANonStandardBeanField",
                    TypeTag::Int,
                    Visibility::Private,
                    Value::Int(-1),
                )
                .static_field(
                    "serial",
                    TypeTag::Int,
                    Visibility::Private,
                    Value::Int(27022008),
                )
                .method("getValue", &[], TypeTag::Int, Visibility::Private, |recv, _| {
                    Ok(recv.read().fields[0].clone())
                })
                .method(
                    "setValue",
                    &[TypeTag::Int],
                    TypeTag::Int,
                    Visibility::Private,
                    |recv, args| {
                        let mut obj = recv.write();
                        let old = obj.fields[0].clone();
                        obj.fields[0] = args[0].clone();
                        Ok(old)
                    },
                )
                // same name as the count field, wrong return type
                .method("getCount", &[], TypeTag::Str, Visibility::Private, |_, _| {
                    Ok(Value::str("nope"))
                })
                .method(
                    "echo",
                    &[TypeTag::Int],
                    TypeTag::Int,
                    Visibility::Private,
                    |_, args| Ok(args[0].clone()),
                )
                .method(
                    "echo",
                    &[TypeTag::Str],
                    TypeTag::Str,
                    Visibility::Private,
                    |_, args| Ok(args[0].clone()),
                )
                .method(
                    "throwingMethod",
                    &[],
                    TypeTag::Unit,
                    Visibility::Private,
                    |_, _| Err(Thrown::checked("TestFailure", "from throwingMethod")),
                )
                .method("quietMethod", &[], TypeTag::Unit, Visibility::Private, |_, _| {
                    Ok(Value::Null)
                })
                .static_method("stamp", &[], TypeTag::Int, Visibility::Private, |_| {
                    Ok(Value::Int(3))
                }),
        )
        .unwrap();
    Fixture { registry, parcel }
}

fn instance(registry: &TypeRegistry, class: ClassId) -> ObjRef {
    let value = registry.construct(class, &[]).unwrap();
    value.as_obj().unwrap().clone()
}

fn bind_err(registry: &TypeRegistry, interface: InterfaceId, target: Target) -> AccessError {
    bind_proxy(interface, target, registry).unwrap_err()
}

/// Unpack a binding failure into its offending method and reason.
fn binding_parts(err: AccessError) -> (String, String) {
    match err {
        AccessError::Binding { method, reason, .. } => (method, reason),
        other => panic!("expected a binding error, got: {other:?}"),
    }
}

// ============================================================================
// Happy Path
// ============================================================================

mod happy_path {
    use super::*;

    #[test]
    fn test_bind_resolves_methods_and_fields() {
        let mut fx = fixture();
        let cargo = fx
            .registry
            .register_interface(
                InterfaceBuilder::new("Cargo")
                    .method("getValue", &[], TypeTag::Int)
                    .method("isMagic", &[], TypeTag::Bool)
                    .method("setWrong", &[TypeTag::Int], TypeTag::Unit)
                    .method("quietMethod", &[], TypeTag::Unit),
            )
            .unwrap();
        let target = instance(&fx.registry, fx.parcel);
        let proxy = bind_proxy(cargo, Target::Instance(target.clone()), &fx.registry).unwrap();
        assert_eq!(proxy.method_count(), 4);

        assert_eq!(proxy.invoke("getValue", &[]).unwrap(), Value::Int(26071973));
        assert_eq!(proxy.invoke("isMagic", &[]).unwrap(), Value::Bool(true));
        // field-backed setter yields null
        assert_eq!(
            proxy.invoke("setWrong", &[Value::Int(5)]).unwrap(),
            Value::Null
        );
        assert_eq!(read_field("wrong", &target, &fx.registry).unwrap(), Value::Int(5));
        assert_eq!(proxy.invoke("quietMethod", &[]).unwrap(), Value::Null);
    }

    #[test]
    fn test_predicate_binds_inherited_fields() {
        let mut fx = fixture();
        let iface = fx
            .registry
            .register_interface(InterfaceBuilder::new("Kinded").method("isKind", &[], TypeTag::Bool))
            .unwrap();
        let target = instance(&fx.registry, fx.parcel);
        let proxy = bind_proxy(iface, Target::Instance(target), &fx.registry).unwrap();
        assert_eq!(proxy.invoke("isKind", &[]).unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_unit_interface_slot_discards_method_results() {
        let mut fx = fixture();
        // setValue(int) on the target returns the old value; the interface
        // declares unit, so the proxy swallows it
        let iface = fx
            .registry
            .register_interface(
                InterfaceBuilder::new("Mutate").method("setValue", &[TypeTag::Int], TypeTag::Unit),
            )
            .unwrap();
        let target = instance(&fx.registry, fx.parcel);
        let proxy = bind_proxy(iface, Target::Instance(target.clone()), &fx.registry).unwrap();

        assert_eq!(
            proxy.invoke("setValue", &[Value::Int(11)]).unwrap(),
            Value::Null
        );
        assert_eq!(read_field("value", &target, &fx.registry).unwrap(), Value::Int(11));
    }

    #[test]
    fn test_value_returning_setter_reports_the_previous_value() {
        let mut fx = fixture();
        // the interface declares int here, so the old value comes back
        // through the proxy instead of being discarded
        let iface = fx
            .registry
            .register_interface(
                InterfaceBuilder::new("Swap")
                    .method("getValue", &[], TypeTag::Int)
                    .method("setValue", &[TypeTag::Int], TypeTag::Int),
            )
            .unwrap();
        let target = instance(&fx.registry, fx.parcel);
        let proxy = bind_proxy(iface, Target::Instance(target), &fx.registry).unwrap();

        assert_eq!(
            proxy.invoke("setValue", &[Value::Int(26072007)]).unwrap(),
            Value::Int(26071973)
        );
        assert_eq!(proxy.invoke("getValue", &[]).unwrap(), Value::Int(26072007));
    }

    #[test]
    fn test_direct_calls_select_overloads() {
        let mut fx = fixture();
        let iface = fx
            .registry
            .register_interface(
                InterfaceBuilder::new("Echo")
                    .method("echo", &[TypeTag::Int], TypeTag::Int)
                    .method("echo", &[TypeTag::Str], TypeTag::Str),
            )
            .unwrap();
        let target = instance(&fx.registry, fx.parcel);
        let proxy = bind_proxy(iface, Target::Instance(target), &fx.registry).unwrap();

        assert_eq!(proxy.invoke("echo", &[Value::Int(8)]).unwrap(), Value::Int(8));
        assert_eq!(
            proxy.invoke("echo", &[Value::str("hi")]).unwrap(),
            Value::str("hi")
        );
        let err = proxy.invoke("echo", &[Value::Bool(true)]).unwrap_err();
        assert!(matches!(err, AccessError::TypeMismatch { .. }));
    }

    #[test]
    fn test_extended_interfaces_flatten_into_the_binding() {
        let mut fx = fixture();
        let base = fx
            .registry
            .register_interface(InterfaceBuilder::new("Base").method("isMagic", &[], TypeTag::Bool))
            .unwrap();
        let ext = fx
            .registry
            .register_interface(
                InterfaceBuilder::new("Ext")
                    .extends(base)
                    .method("getValue", &[], TypeTag::Int),
            )
            .unwrap();
        let target = instance(&fx.registry, fx.parcel);
        let proxy = bind_proxy(ext, Target::Instance(target), &fx.registry).unwrap();

        assert_eq!(proxy.method_count(), 2);
        assert_eq!(proxy.invoke("isMagic", &[]).unwrap(), Value::Bool(true));
        assert_eq!(proxy.invoke("getValue", &[]).unwrap(), Value::Int(26071973));
    }
}

// ============================================================================
// Shape Errors
// ============================================================================

mod shape_errors {
    use super::*;

    fn assert_rejected(iface: InterfaceBuilder, method: &str, reason_part: &str) {
        let mut fx = fixture();
        let id = fx.registry.register_interface(iface).unwrap();
        let target = instance(&fx.registry, fx.parcel);
        let err = bind_err(&fx.registry, id, Target::Instance(target));
        let (failed, reason) = binding_parts(err);
        assert_eq!(failed, method);
        assert!(
            reason.contains(reason_part),
            "reason `{reason}` missing `{reason_part}`"
        );
    }

    #[test]
    fn test_predicate_with_arguments_is_rejected() {
        assert_rejected(
            InterfaceBuilder::new("Bad").method("isMagic", &[TypeTag::Int], TypeTag::Bool),
            "isMagic",
            "no parameters",
        );
    }

    #[test]
    fn test_predicate_must_return_bool() {
        assert_rejected(
            InterfaceBuilder::new("Bad").method("isMagic", &[], TypeTag::Int),
            "isMagic",
            "return bool",
        );
    }

    #[test]
    fn test_getter_must_return_a_value() {
        assert_rejected(
            InterfaceBuilder::new("Bad").method("getValue", &[], TypeTag::Unit),
            "getValue",
            "return a value",
        );
    }

    #[test]
    fn test_getter_with_arguments_is_rejected() {
        assert_rejected(
            InterfaceBuilder::new("Bad").method("getValue", &[TypeTag::Int], TypeTag::Int),
            "getValue",
            "no parameters",
        );
    }

    #[test]
    fn test_setter_arity_is_checked() {
        assert_rejected(
            InterfaceBuilder::new("Bad").method("setWrong", &[], TypeTag::Unit),
            "setWrong",
            "exactly one parameter",
        );
        assert_rejected(
            InterfaceBuilder::new("Bad")
                .method("setWrong", &[TypeTag::Int, TypeTag::Int], TypeTag::Unit),
            "setWrong",
            "exactly one parameter",
        );
    }

    #[test]
    fn test_iz_is_not_a_convention_prefix() {
        // izMagic is a direct call, and no such method exists
        assert_rejected(
            InterfaceBuilder::new("Bad").method("izMagic", &[], TypeTag::Bool),
            "izMagic",
            "no method",
        );
    }

    #[test]
    fn test_bare_prefixes_are_direct_calls() {
        assert_rejected(
            InterfaceBuilder::new("Bad").method("get", &[], TypeTag::Int),
            "get",
            "no method",
        );
    }

    #[test]
    fn test_lowercase_rest_is_not_a_convention() {
        // "issue" does not announce a predicate
        assert_rejected(
            InterfaceBuilder::new("Bad").method("issue", &[], TypeTag::Int),
            "issue",
            "no method",
        );
    }
}

// ============================================================================
// Candidate Fallback Rules
// ============================================================================

mod fallback_rules {
    use super::*;

    #[test]
    fn test_incompatible_method_falls_through_to_the_field() {
        let mut fx = fixture();
        // getCount() the method returns str; the interface wants int, so
        // resolution lands on the count field instead
        let iface = fx
            .registry
            .register_interface(InterfaceBuilder::new("Counter").method("getCount", &[], TypeTag::Int))
            .unwrap();
        let target = instance(&fx.registry, fx.parcel);
        let proxy = bind_proxy(iface, Target::Instance(target.clone()), &fx.registry).unwrap();

        assert_eq!(proxy.invoke("getCount", &[]).unwrap(), Value::Int(7));
        // prove it reads the field, not the method
        fx.registry.set_field(&target, "count", Value::Int(99)).unwrap();
        assert_eq!(proxy.invoke("getCount", &[]).unwrap(), Value::Int(99));
    }

    #[test]
    fn test_compatible_method_wins_over_the_field() {
        let mut fx = fixture();
        // both getCount() and the count field exist and would satisfy a
        // str interface only through the method
        let iface = fx
            .registry
            .register_interface(InterfaceBuilder::new("Counter").method("getCount", &[], TypeTag::Str))
            .unwrap();
        let target = instance(&fx.registry, fx.parcel);
        let proxy = bind_proxy(iface, Target::Instance(target), &fx.registry).unwrap();
        assert_eq!(proxy.invoke("getCount", &[]).unwrap(), Value::str("nope"));
    }

    #[test]
    fn test_method_type_failure_still_consults_the_field() {
        let mut fx = fixture();
        let iface = fx
            .registry
            .register_interface(InterfaceBuilder::new("Valued").method("getValue", &[], TypeTag::Str))
            .unwrap();
        let target = instance(&fx.registry, fx.parcel);
        // the getValue method returns int and is skipped; the value field
        // is int too, so the bind fails on the field with its type
        let (_, reason) = binding_parts(bind_err(&fx.registry, iface, Target::Instance(target)));
        assert!(reason.contains("field `value`"), "reason: {reason}");
    }

    #[test]
    fn test_incompatible_field_is_terminal() {
        let mut fx = fixture();
        // wrong is an int field, so isWrong cannot bind it
        let iface = fx
            .registry
            .register_interface(InterfaceBuilder::new("Wrongly").method("isWrong", &[], TypeTag::Bool))
            .unwrap();
        let target = instance(&fx.registry, fx.parcel);
        let (_, reason) = binding_parts(bind_err(&fx.registry, iface, Target::Instance(target)));
        assert!(reason.contains("field `wrong`"), "reason: {reason}");
        assert!(reason.contains("int"), "reason: {reason}");
    }

    #[test]
    fn test_field_backed_setter_must_return_unit() {
        let mut fx = fixture();
        let iface = fx
            .registry
            .register_interface(
                InterfaceBuilder::new("Setter").method("setWrong", &[TypeTag::Int], TypeTag::Int),
            )
            .unwrap();
        let target = instance(&fx.registry, fx.parcel);
        let (_, reason) = binding_parts(bind_err(&fx.registry, iface, Target::Instance(target)));
        assert!(reason.contains("must return unit"), "reason: {reason}");
    }

    #[test]
    fn test_setter_field_type_is_checked() {
        let mut fx = fixture();
        let iface = fx
            .registry
            .register_interface(
                InterfaceBuilder::new("Setter").method("setWrong", &[TypeTag::Str], TypeTag::Unit),
            )
            .unwrap();
        let target = instance(&fx.registry, fx.parcel);
        let (_, reason) = binding_parts(bind_err(&fx.registry, iface, Target::Instance(target)));
        assert!(reason.contains("field `wrong`"), "reason: {reason}");
    }

    #[test]
    fn test_missing_member_names_both_candidates() {
        let mut fx = fixture();
        let iface = fx
            .registry
            .register_interface(InterfaceBuilder::new("Gone").method("getMissing", &[], TypeTag::Int))
            .unwrap();
        let target = instance(&fx.registry, fx.parcel);
        let (_, reason) = binding_parts(bind_err(&fx.registry, iface, Target::Instance(target)));
        assert!(reason.contains("getMissing"), "reason: {reason}");
        assert!(reason.contains("field `missing`"), "reason: {reason}");
    }

    #[test]
    fn test_binding_is_all_or_nothing() {
        let mut fx = fixture();
        let iface = fx
            .registry
            .register_interface(
                InterfaceBuilder::new("Mixed")
                    .method("getValue", &[], TypeTag::Int)
                    .method("getMissing", &[], TypeTag::Int),
            )
            .unwrap();
        let target = instance(&fx.registry, fx.parcel);
        let (failed, _) = binding_parts(bind_err(&fx.registry, iface, Target::Instance(target)));
        assert_eq!(failed, "getMissing");
    }
}

// ============================================================================
// Rename Tables
// ============================================================================

mod renaming {
    use super::*;

    #[test]
    fn test_renames_redirect_method_resolution() {
        let mut fx = fixture();
        let iface = fx
            .registry
            .register_interface(
                InterfaceBuilder::new("Birthday").method("getBirthDate", &[], TypeTag::Int),
            )
            .unwrap();
        let renames = RenameTable::new().rename("getBirthDate", "getPrivate");
        let target = instance(&fx.registry, fx.parcel);
        let proxy =
            bind_proxy_renamed(iface, Target::Instance(target), &renames, &fx.registry).unwrap();
        assert_eq!(proxy.invoke("getBirthDate", &[]).unwrap(), Value::Int(26071973));
    }

    #[test]
    fn test_renames_apply_again_to_derived_field_names() {
        let mut fx = fixture();
        let iface = fx
            .registry
            .register_interface(
                InterfaceBuilder::new("NonStandard").method("getNonStandard", &[], TypeTag::Int),
            )
            .unwrap();
        // first hop renames the method, second hop fixes the derived
        // field name's capitalization
        let renames = RenameTable::new()
            .rename("getNonStandard", "getANonStandardBeanField")
            .rename("aNonStandardBeanField", "ANonStandardBeanField");
        let target = instance(&fx.registry, fx.parcel);
        let proxy =
            bind_proxy_renamed(iface, Target::Instance(target), &renames, &fx.registry).unwrap();
        assert_eq!(proxy.invoke("getNonStandard", &[]).unwrap(), Value::Int(-1));
    }

    #[test]
    fn test_derived_names_miss_without_the_second_rename() {
        let mut fx = fixture();
        let iface = fx
            .registry
            .register_interface(
                InterfaceBuilder::new("NonStandard").method("getNonStandard", &[], TypeTag::Int),
            )
            .unwrap();
        let renames = RenameTable::new().rename("getNonStandard", "getANonStandardBeanField");
        let target = instance(&fx.registry, fx.parcel);
        let err =
            bind_proxy_renamed(iface, Target::Instance(target), &renames, &fx.registry).unwrap_err();
        let (_, reason) = binding_parts(err);
        assert!(reason.contains("aNonStandardBeanField"), "reason: {reason}");
    }
}

// ============================================================================
// Static Targets
// ============================================================================

mod static_targets {
    use super::*;

    #[test]
    fn test_static_field_binding() {
        let mut fx = fixture();
        let iface = fx
            .registry
            .register_interface(InterfaceBuilder::new("Serial").method("getSerial", &[], TypeTag::Int))
            .unwrap();
        let proxy = bind_proxy(iface, Target::Static(fx.parcel), &fx.registry).unwrap();
        assert_eq!(proxy.invoke("getSerial", &[]).unwrap(), Value::Int(27022008));
    }

    #[test]
    fn test_static_method_binding() {
        let mut fx = fixture();
        let iface = fx
            .registry
            .register_interface(InterfaceBuilder::new("Stamped").method("stamp", &[], TypeTag::Int))
            .unwrap();
        let proxy = bind_proxy(iface, Target::Static(fx.parcel), &fx.registry).unwrap();
        assert_eq!(proxy.invoke("stamp", &[]).unwrap(), Value::Int(3));
    }

    #[test]
    fn test_static_setter_writes_class_state() {
        let mut fx = fixture();
        let iface = fx
            .registry
            .register_interface(
                InterfaceBuilder::new("SerialSet").method("setSerial", &[TypeTag::Int], TypeTag::Unit),
            )
            .unwrap();
        let proxy = bind_proxy(iface, Target::Static(fx.parcel), &fx.registry).unwrap();
        proxy.invoke_void("setSerial", &[Value::Int(41)]).unwrap();

        let serial = access_static_field("serial", fx.parcel, &fx.registry).unwrap();
        assert_eq!(serial.get().unwrap(), Value::Int(41));
    }

    #[test]
    fn test_instance_members_cannot_bind_to_a_class_target() {
        let mut fx = fixture();
        let iface = fx
            .registry
            .register_interface(InterfaceBuilder::new("Valued").method("getValue", &[], TypeTag::Int))
            .unwrap();
        let (_, reason) = binding_parts(bind_err(&fx.registry, iface, Target::Static(fx.parcel)));
        assert!(reason.contains("is not static"), "reason: {reason}");
    }

    #[test]
    fn test_static_members_cannot_bind_to_an_instance_target() {
        let mut fx = fixture();
        let iface = fx
            .registry
            .register_interface(InterfaceBuilder::new("Stamped").method("stamp", &[], TypeTag::Int))
            .unwrap();
        let target = instance(&fx.registry, fx.parcel);
        let (_, reason) = binding_parts(bind_err(&fx.registry, iface, Target::Instance(target)));
        assert!(reason.contains("is static"), "reason: {reason}");
    }
}

// ============================================================================
// Invocation
// ============================================================================

mod invocation {
    use super::*;

    fn cargo_proxy(fx: &mut Fixture) -> (ObjRef, InterfaceId) {
        let iface = fx
            .registry
            .register_interface(
                InterfaceBuilder::new("Cargo")
                    .method("getValue", &[], TypeTag::Int)
                    .method("setWrong", &[TypeTag::Int], TypeTag::Unit)
                    .method("throwingMethod", &[], TypeTag::Unit),
            )
            .unwrap();
        let target = instance(&fx.registry, fx.parcel);
        (target, iface)
    }

    #[test]
    fn test_unknown_interface_method_is_not_found() {
        let mut fx = fixture();
        let (target, iface) = cargo_proxy(&mut fx);
        let proxy = bind_proxy(iface, Target::Instance(target), &fx.registry).unwrap();
        match proxy.invoke("nope", &[]).unwrap_err() {
            AccessError::MemberNotFound { class, member } => {
                assert_eq!(class, "Cargo");
                assert_eq!(member, "nope");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_arguments_are_validated_against_the_interface() {
        let mut fx = fixture();
        let (target, iface) = cargo_proxy(&mut fx);
        let proxy = bind_proxy(iface, Target::Instance(target), &fx.registry).unwrap();
        let err = proxy.invoke("setWrong", &[Value::str("x")]).unwrap_err();
        assert!(matches!(err, AccessError::TypeMismatch { .. }));
        let err = proxy.invoke("getValue", &[Value::Int(1)]).unwrap_err();
        assert!(matches!(err, AccessError::TypeMismatch { .. }));
    }

    #[test]
    fn test_raised_failures_keep_their_cause() {
        let mut fx = fixture();
        let (target, iface) = cargo_proxy(&mut fx);
        let proxy = bind_proxy(iface, Target::Instance(target), &fx.registry).unwrap();
        match proxy.invoke("throwingMethod", &[]).unwrap_err() {
            AccessError::TargetFailure(thrown) => {
                assert_eq!(thrown.kind, ThrowKind::Checked);
                assert_eq!(thrown.name, "TestFailure");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_interface_id_is_rejected() {
        let fx = fixture();
        let target = instance(&fx.registry, fx.parcel);
        let err = bind_proxy(999, Target::Instance(target), &fx.registry).unwrap_err();
        assert!(matches!(err, AccessError::UnknownType(_)));
    }

    #[test]
    fn test_proxies_are_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ProxyAccessor<'static>>();
        assert_send_sync::<TypeRegistry>();
        assert_send_sync::<Value>();
        assert_send_sync::<Target>();
    }
}
