use super::*;
use crate::oracle::{BytecodeNames, MappingTable};
use jm_classfile::access::*;
use jm_classfile::opcodes::*;
use jm_classfile::{ClassFileWriter, LoadKind};

const OBJECT: &str = "java/lang/Object";

type Entry = (String, Vec<u8>);

fn entry(writer: ClassFileWriter, name: &str) -> Entry {
    (name.to_string(), writer.finish())
}

fn class(name: &str, super_name: &str) -> ClassFileWriter {
    ClassFileWriter::new(name, Some(super_name), ACC_PUBLIC | ACC_SUPER)
}

fn interface(name: &str) -> ClassFileWriter {
    ClassFileWriter::new(name, Some(OBJECT), ACC_PUBLIC | ACC_INTERFACE | ACC_ABSTRACT)
}

fn void_method(writer: ClassFileWriter, access: u16, name: &str) -> ClassFileWriter {
    writer.method(access, name, "()V", |code| {
        code.op(RETURN);
    })
}

fn run(
    primary: Vec<Entry>,
    libraries: Vec<Entry>,
    oracle: &dyn NameOracle,
    obfuscated: bool,
) -> (ClassLoader, Vec<Diagnostic>) {
    let mut loader = ClassLoader::with_builtin_runtime();
    let classes = loader.load_entries(primary, true);
    loader.load_entries(libraries, false);
    let mut resolver = Resolver::new(loader, oracle, obfuscated);
    resolver.resolve_archive(&classes);
    resolver.into_parts()
}

fn method<'a>(loader: &'a ClassLoader, owner: &str, name: &str, descriptor: &str) -> &'a MethodRecord {
    loader
        .peek(owner)
        .and_then(|record| record.method(name, descriptor))
        .unwrap_or_else(|| panic!("{}.{}{} not loaded", owner, name, descriptor))
}

fn refs(items: &[(&str, &str, &str)]) -> BTreeSet<MethodRef> {
    items
        .iter()
        .map(|(owner, name, descriptor)| MethodRef::new(*owner, *name, *descriptor))
        .collect()
}

#[test]
fn generic_bridge_resolves_to_interface_root() {
    let erased = "(Ljava/lang/Object;)Ljava/lang/Object;";
    let typed = MethodRef::new("p/Upper", "apply", "(Ljava/lang/String;)Ljava/lang/String;");
    let function = interface("p/Fn").abstract_method(ACC_PUBLIC | ACC_ABSTRACT, "apply", erased);
    let upper = class("p/Upper", OBJECT)
        .interface("p/Fn")
        .method(ACC_PUBLIC, &typed.name, &typed.descriptor, |code| {
            code.load(LoadKind::Reference, 1).op(ARETURN);
        })
        .method(ACC_PUBLIC | ACC_SYNTHETIC | ACC_BRIDGE, "apply", erased, |code| {
            code.load(LoadKind::Reference, 0)
                .load(LoadKind::Reference, 1)
                .checkcast("java/lang/String")
                .invoke(INVOKEVIRTUAL, &typed)
                .op(ARETURN);
        });

    let (loader, diagnostics) = run(
        vec![entry(function, "p/Fn"), entry(upper, "p/Upper")],
        Vec::new(),
        &BytecodeNames,
        false,
    );
    assert!(diagnostics.is_empty(), "{:?}", diagnostics);

    let root = MethodRef::new("p/Fn", "apply", erased);
    let bridge = method(&loader, "p/Upper", "apply", erased);
    let bounce = bridge.bounce.as_ref().expect("bridge keeps its bounce");
    assert_eq!(bounce.target, typed);
    assert_eq!(bounce.resolved_owner.as_ref(), Some(&root));
    assert_eq!(bridge.parent.as_ref(), Some(&root));

    let implementation = method(&loader, "p/Upper", &typed.name, &typed.descriptor);
    assert!(implementation.targets_this.contains(&bridge.method_ref()));
    assert_eq!(implementation.overrides, BTreeSet::from([root]));
}

#[test]
fn bounce_target_moves_to_declaring_ancestor() {
    // The bridge calls `p/Mid.run(String)` but only `p/Base` declares it.
    let typed = MethodRef::new("p/Mid", "run", "(Ljava/lang/String;)V");
    let base = class("p/Base", OBJECT).method(ACC_PUBLIC, "run", &typed.descriptor, |code| {
        code.op(RETURN);
    });
    let mid = class("p/Mid", "p/Base");
    let child = class("p/Child", "p/Mid").method(
        ACC_PUBLIC | ACC_SYNTHETIC | ACC_BRIDGE,
        "run",
        "(Ljava/lang/Object;)V",
        |code| {
            code.load(LoadKind::Reference, 0)
                .load(LoadKind::Reference, 1)
                .checkcast("java/lang/String")
                .invoke(INVOKEVIRTUAL, &typed)
                .op(RETURN);
        },
    );

    let (loader, _) = run(
        vec![entry(base, "p/Base"), entry(mid, "p/Mid"), entry(child, "p/Child")],
        Vec::new(),
        &BytecodeNames,
        false,
    );
    let bridge = method(&loader, "p/Child", "run", "(Ljava/lang/Object;)V");
    let bounce = bridge.bounce.as_ref().expect("bounce");
    assert_eq!(bounce.target, typed.with_owner("p/Base"));
    assert!(bounce.resolved_owner.is_none());
}

#[test]
fn abstract_and_transitive_interface_roots_are_united() {
    let a = ClassFileWriter::new("s/A", Some(OBJECT), ACC_PUBLIC | ACC_SUPER | ACC_ABSTRACT)
        .abstract_method(ACC_PUBLIC | ACC_ABSTRACT, "m", "()V");
    let b = void_method(class("s/B", "s/A"), ACC_PUBLIC, "m");
    let i = interface("s/I").abstract_method(ACC_PUBLIC | ACC_ABSTRACT, "m", "()V");
    let c = class("s/C", "s/B").interface("s/I");

    let (loader, diagnostics) = run(
        vec![entry(a, "s/A"), entry(b, "s/B"), entry(c, "s/C"), entry(i, "s/I")],
        Vec::new(),
        &BytecodeNames,
        false,
    );
    assert!(diagnostics.is_empty(), "{:?}", diagnostics);
    assert_eq!(
        method(&loader, "s/B", "m", "()V").overrides,
        refs(&[("s/A", "m", "()V"), ("s/I", "m", "()V")])
    );
    // The abstract declaration is itself reached through `s/C` and joins `s/I`.
    assert_eq!(method(&loader, "s/A", "m", "()V").overrides, refs(&[("s/I", "m", "()V")]));
    assert!(method(&loader, "s/B", "m", "()V").forced_name.is_none());
}

#[test]
fn library_implementation_forces_its_name_on_siblings() {
    let lib = void_method(class("lib/Base", OBJECT), ACC_PUBLIC, "tick");
    let api = interface("s/Ticker").abstract_method(ACC_PUBLIC | ACC_ABSTRACT, "tick", "()V");
    let clock = class("s/Clock", "lib/Base").interface("s/Ticker");

    let (loader, _) = run(
        vec![entry(api, "s/Ticker"), entry(clock, "s/Clock")],
        vec![entry(lib, "lib/Base")],
        &BytecodeNames,
        false,
    );
    let inherited = method(&loader, "lib/Base", "tick", "()V");
    assert!(inherited.overrides.contains(&MethodRef::new("s/Ticker", "tick", "()V")));
    assert_eq!(
        method(&loader, "s/Ticker", "tick", "()V").forced_name.as_deref(),
        Some("tick")
    );
}

#[test]
fn first_parent_is_nearest_primary_declaration() {
    let lib = void_method(class("lib/L", OBJECT), ACC_PUBLIC, "m");
    let p = void_method(class("q/P", "lib/L"), ACC_PUBLIC, "m");
    let q = void_method(class("q/Q", "q/P"), ACC_PUBLIC, "m");
    let sealed = void_method(class("q/R", "q/Q"), ACC_PUBLIC | ACC_STATIC, "m");

    let (loader, _) = run(
        vec![entry(p, "q/P"), entry(q, "q/Q"), entry(sealed, "q/R")],
        vec![entry(lib, "lib/L")],
        &BytecodeNames,
        false,
    );
    assert_eq!(
        method(&loader, "q/Q", "m", "()V").parent,
        Some(MethodRef::new("q/P", "m", "()V"))
    );
    let p_m = method(&loader, "q/P", "m", "()V");
    assert!(p_m.parent.is_none());
    assert_eq!(p_m.overrides, refs(&[("lib/L", "m", "()V")]));
    assert_eq!(method(&loader, "q/Q", "m", "()V").overrides, refs(&[("lib/L", "m", "()V")]));
    let hidden = method(&loader, "q/R", "m", "()V");
    assert!(hidden.parent.is_none());
    assert!(hidden.overrides.is_empty());
}

#[test]
fn obfuscated_enum_members_take_official_names() {
    let mut official = MappingTable::new();
    official
        .add_class("net/Color", "a")
        .add_field("RED", "b")
        .add_field("$VALUES", "c")
        .add_field("rgb", "x")
        .add_method("values", "()[Lnet/Color;", "d")
        .add_method("valueOf", "(Ljava/lang/String;)Lnet/Color;", "e")
        .add_method("brighter", "()V", "f");
    let oracle = official.reversed();

    let color = ClassFileWriter::new("a", Some("java/lang/Enum"), ACC_PUBLIC | ACC_FINAL | ACC_SUPER | ACC_ENUM)
        .field(ACC_PUBLIC | ACC_STATIC | ACC_FINAL | ACC_ENUM, "b", "La;")
        .field(ACC_PRIVATE | ACC_STATIC | ACC_FINAL | ACC_SYNTHETIC, "c", "[La;")
        .field(ACC_PRIVATE | ACC_FINAL, "x", "I")
        .method(ACC_PUBLIC | ACC_STATIC, "d", "()[La;", |code| {
            code.op(ACONST_NULL).op(ARETURN);
        })
        .method(ACC_PUBLIC | ACC_STATIC, "e", "(Ljava/lang/String;)La;", |code| {
            code.op(ACONST_NULL).op(ARETURN);
        });
    let color = void_method(color, ACC_PUBLIC, "f");

    let (mut loader, _) = run(vec![entry(color, "a")], Vec::new(), &oracle, true);
    let record = loader.get("a").expect("enum loaded");
    assert_eq!(record.fields["b"].forced_name.as_deref(), Some("RED"));
    assert_eq!(record.fields["c"].forced_name.as_deref(), Some("$VALUES"));
    assert!(record.fields["x"].forced_name.is_none());

    let values = record.method("d", "()[La;").expect("values");
    assert_eq!(values.forced_name.as_deref(), Some("values"));
    assert!(values.is_name_pinned());
    let value_of = record.method("e", "(Ljava/lang/String;)La;").expect("valueOf");
    assert_eq!(value_of.forced_name.as_deref(), Some("valueOf"));
    assert!(record.method("f", "()V").expect("f").forced_name.is_none());
}

#[test]
fn plain_enum_trusts_bytecode_names() {
    let color = ClassFileWriter::new("e/Color", Some("java/lang/Enum"), ACC_PUBLIC | ACC_FINAL | ACC_SUPER | ACC_ENUM)
        .field(ACC_PUBLIC | ACC_STATIC | ACC_FINAL | ACC_ENUM, "RED", "Le/Color;")
        .method(ACC_PUBLIC | ACC_STATIC, "values", "()[Le/Color;", |code| {
            code.op(ACONST_NULL).op(ARETURN);
        })
        .method(ACC_PUBLIC | ACC_STATIC, "valueOf", "(Ljava/lang/String;)Le/Color;", |code| {
            code.op(ACONST_NULL).op(ARETURN);
        })
        .method(ACC_PUBLIC | ACC_STATIC, "values", "()V", |code| {
            code.op(RETURN);
        });

    let (loader, _) = run(vec![entry(color, "e/Color")], Vec::new(), &BytecodeNames, false);
    let record = loader.peek("e/Color").expect("loaded");
    assert_eq!(record.fields["RED"].forced_name.as_deref(), Some("RED"));
    assert_eq!(
        record.method("values", "()[Le/Color;").and_then(|m| m.forced_name.as_deref()),
        Some("values")
    );
    assert!(record.method("values", "()V").and_then(|m| m.forced_name.as_deref()).is_none());
}

#[test]
fn record_with_two_getters_keeps_the_first() {
    let getter = |code: &mut jm_classfile::CodeWriter<'_>| {
        code.load(LoadKind::Reference, 0)
            .getfield("r/Point", "x", "I")
            .op(IRETURN);
    };
    let point = ClassFileWriter::new("r/Point", Some(crate::model::RECORD_BASE), ACC_PUBLIC | ACC_FINAL | ACC_SUPER)
        .field(ACC_PRIVATE | ACC_FINAL, "x", "I")
        .field(ACC_PRIVATE | ACC_FINAL, "y", "I")
        .method(ACC_PUBLIC, "x", "()I", getter)
        .method(ACC_PUBLIC, "getX", "()I", getter)
        .method(ACC_PUBLIC, "y", "()I", |code| {
            code.load(LoadKind::Reference, 0)
                .getfield("r/Point", "y", "I")
                .op(IRETURN);
        });

    let (loader, diagnostics) = run(vec![entry(point, "r/Point")], Vec::new(), &BytecodeNames, false);
    let components = loader
        .peek("r/Point")
        .and_then(|record| record.record_components.clone())
        .expect("record components");
    let accessors: Vec<Option<&str>> = components.iter().map(|c| c.accessor.as_deref()).collect();
    assert_eq!(accessors, vec![Some("x"), Some("y")]);
    assert_eq!(
        diagnostics,
        vec![Diagnostic::UnexpectedRecordAccessorCount {
            class: "r/Point".to_string(),
            field: "x".to_string(),
            accessors: vec!["x".to_string(), "getX".to_string()],
        }]
    );
}

#[test]
fn unimplemented_interface_method_is_reported() {
    let job = interface("u/Job").abstract_method(ACC_PUBLIC | ACC_ABSTRACT, "run", "()V");
    let worker = class("u/Worker", OBJECT).interface("u/Job");

    let (_, diagnostics) = run(
        vec![entry(job, "u/Job"), entry(worker, "u/Worker")],
        Vec::new(),
        &BytecodeNames,
        false,
    );
    assert_eq!(
        diagnostics,
        vec![Diagnostic::UnresolvedAbstractContract {
            class: "u/Worker".to_string(),
            contract: MethodRef::new("u/Job", "run", "()V"),
        }]
    );
}

#[test]
fn cycles_and_missing_parents_are_diagnosed() {
    let x = void_method(class("c/X", "c/Y"), ACC_PUBLIC, "m");
    let y = void_method(class("c/Y", "c/X"), ACC_PUBLIC, "m");
    let orphan = class("c/Orphan", "c/Gone");

    let (mut loader, diagnostics) = run(
        vec![entry(x, "c/X"), entry(y, "c/Y"), entry(orphan, "c/Orphan")],
        Vec::new(),
        &BytecodeNames,
        false,
    );
    assert!(diagnostics.contains(&Diagnostic::CyclicHierarchy {
        class: "c/X".to_string()
    }));
    assert!(diagnostics.contains(&Diagnostic::MissingClass {
        class: "c/Gone".to_string()
    }));
    for name in ["c/X", "c/Y", "c/Orphan"] {
        assert!(loader.get(name).map(|record| record.is_resolved()).unwrap_or(false), "{}", name);
    }
}

fn bridge(writer: ClassFileWriter, descriptor: &str, target: &MethodRef) -> ClassFileWriter {
    writer.method(ACC_PUBLIC | ACC_SYNTHETIC | ACC_BRIDGE, &target.name, descriptor, |code| {
        code.load(LoadKind::Reference, 0)
            .invoke(INVOKEVIRTUAL, target)
            .op(ARETURN);
    })
}

fn getter(writer: ClassFileWriter, descriptor: &str) -> ClassFileWriter {
    writer.method(ACC_PUBLIC, "get", descriptor, |code| {
        code.op(ACONST_NULL).op(ARETURN);
    })
}

const GET_OBJECT: &str = "()Ljava/lang/Object;";
const GET_CHARS: &str = "()Ljava/lang/CharSequence;";
const GET_STRING: &str = "()Ljava/lang/String;";

#[test]
fn ambiguous_bounce_owner_takes_the_smallest_root() {
    let z = interface("p/Z").abstract_method(ACC_PUBLIC | ACC_ABSTRACT, "get", GET_OBJECT);
    let a = interface("p/A").abstract_method(ACC_PUBLIC | ACC_ABSTRACT, "get", GET_OBJECT);
    let b = getter(class("p/B", OBJECT).interface("p/Z").interface("p/A"), GET_OBJECT);
    let typed = MethodRef::new("p/C", "get", GET_STRING);
    let c = bridge(getter(class("p/C", "p/B"), GET_STRING), GET_OBJECT, &typed);

    let (loader, diagnostics) = run(
        vec![entry(z, "p/Z"), entry(a, "p/A"), entry(b, "p/B"), entry(c, "p/C")],
        Vec::new(),
        &BytecodeNames,
        false,
    );
    let winner = MethodRef::new("p/A", "get", GET_OBJECT);
    let bounce = method(&loader, "p/C", "get", GET_OBJECT).bounce.as_ref().expect("bounce");
    assert_eq!(bounce.resolved_owner.as_ref(), Some(&winner));

    let ambiguous: Vec<&Diagnostic> = diagnostics
        .iter()
        .filter(|diagnostic| matches!(diagnostic, Diagnostic::AmbiguousBounceOwner { .. }))
        .collect();
    assert_eq!(
        ambiguous,
        vec![&Diagnostic::AmbiguousBounceOwner {
            bouncer: MethodRef::new("p/C", "get", GET_OBJECT),
            candidates: vec![winner.clone(), MethodRef::new("p/Z", "get", GET_OBJECT)],
            chosen: winner,
        }]
    );
}

#[test]
fn bouncer_reached_through_another_bouncer_shares_its_owner() {
    // p/D: get()Object -> get()CharSequence -> get()String, under p/Base.get()Object.
    // p/E re-bridges get()CharSequence and finds p/D's chain already walked.
    let base = getter(class("p/Base", OBJECT), GET_OBJECT);
    let d_chars = MethodRef::new("p/D", "get", GET_CHARS);
    let d_string = MethodRef::new("p/D", "get", GET_STRING);
    let d = getter(class("p/D", "p/Base"), GET_STRING);
    let d = bridge(bridge(d, GET_CHARS, &d_string), GET_OBJECT, &d_chars);
    let e_string = MethodRef::new("p/E", "get", GET_STRING);
    let e = bridge(getter(class("p/E", "p/D"), GET_STRING), GET_CHARS, &e_string);

    let (loader, diagnostics) = run(
        vec![entry(base, "p/Base"), entry(d, "p/D"), entry(e, "p/E")],
        Vec::new(),
        &BytecodeNames,
        false,
    );
    assert!(diagnostics.is_empty(), "{:?}", diagnostics);

    let root = MethodRef::new("p/Base", "get", GET_OBJECT);
    let owner_of = |owner: &str, descriptor: &str| {
        method(&loader, owner, "get", descriptor)
            .bounce
            .as_ref()
            .and_then(|bounce| bounce.resolved_owner.clone())
    };
    assert_eq!(owner_of("p/D", GET_OBJECT), Some(root.clone()));
    assert_eq!(owner_of("p/D", GET_CHARS), Some(root.clone()));
    assert_eq!(owner_of("p/E", GET_CHARS), Some(root));
    assert!(method(&loader, "p/D", "get", GET_CHARS)
        .targets_this
        .contains(&MethodRef::new("p/D", "get", GET_OBJECT)));
}

#[test]
fn bounce_chain_without_a_root_is_reported() {
    let d_chars = MethodRef::new("p/D", "get", GET_CHARS);
    let d_string = MethodRef::new("p/D", "get", GET_STRING);
    let d = getter(class("p/D", OBJECT), GET_STRING);
    let d = bridge(bridge(d, GET_CHARS, &d_string), GET_OBJECT, &d_chars);

    let (loader, diagnostics) = run(vec![entry(d, "p/D")], Vec::new(), &BytecodeNames, false);
    assert_eq!(
        diagnostics,
        vec![Diagnostic::UnwalkableBounce {
            bouncer: d_chars.clone(),
            via: MethodRef::new("p/D", "get", GET_OBJECT),
        }]
    );
    for descriptor in [GET_OBJECT, GET_CHARS] {
        let bounce = method(&loader, "p/D", "get", descriptor).bounce.as_ref().expect("bounce");
        assert!(bounce.resolved_owner.is_none());
    }
}

#[test]
fn repeated_findings_are_kept_once_in_order() {
    let mut resolver = Resolver::new(ClassLoader::with_builtin_runtime(), &BytecodeNames, false);
    let cycle = |class: &str| Diagnostic::CyclicHierarchy {
        class: class.to_string(),
    };
    for class in ["d/B", "d/A", "d/B", "d/A", "d/B"] {
        resolver.report(cycle(class));
    }
    assert_eq!(resolver.diagnostics(), &[cycle("d/B"), cycle("d/A")]);
}
