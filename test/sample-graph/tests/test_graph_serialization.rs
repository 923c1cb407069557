use reflect_graph::{
    deserialize, serialize_to_string, ReflectedValue, ReflectionError, TypeRegistry,
};
use sample_graph::{
    register_sample_types, Base, Chain, Derived, Foo, Grid, Holder, Inner, Msg, Node, Outer,
};

fn reflect<T>(type_name: &str, instance: &T) -> ReflectedValue {
    register_sample_types();
    ReflectedValue::from_ref(
        TypeRegistry::lookup(type_name).expect("sample type registered"),
        instance,
    )
}

#[test]
fn leaf_members_roundtrip() {
    let foo = Foo { x: 10, y: 13.0 };

    let text = serialize_to_string(&reflect("Foo", &foo)).unwrap();
    assert_eq!(text, "1\n0 Foo\n[\n\tx 10\n\ty 13\n]\n");

    let graph = deserialize(text.as_bytes()).unwrap();
    let decoded: &Foo = unsafe { graph.root_value::<Foo>() };
    assert_eq!(*decoded, foo);
}

#[test]
fn pointer_sharing_and_null_targets() {
    let mut b = Node {
        v: 2,
        next: std::ptr::null_mut(),
    };
    let a = Node {
        v: 1,
        next: &mut b,
    };

    let text = serialize_to_string(&reflect("Node", &a)).unwrap();
    // Two live nodes plus the reserved entry for the null target of b.next.
    assert!(text.starts_with("3\n"));

    let graph = deserialize(text.as_bytes()).unwrap();
    let decoded: &Node = unsafe { graph.root_value::<Node>() };
    assert_eq!(decoded.v, 1);
    assert!(!decoded.next.is_null());
    let decoded_b = unsafe { &*decoded.next };
    assert_eq!(decoded_b.v, 2);
    assert!(decoded_b.next.is_null());
}

#[test]
fn cycles_serialize_and_rebuild() {
    let mut a = Node {
        v: 1,
        next: std::ptr::null_mut(),
    };
    let mut b = Node {
        v: 2,
        next: &mut a,
    };
    a.next = &mut b;

    let text = serialize_to_string(&reflect("Node", &a)).unwrap();
    assert!(text.starts_with("2\n"));

    let graph = deserialize(text.as_bytes()).unwrap();
    let decoded: &Node = unsafe { graph.root_value::<Node>() };
    let decoded_b = unsafe { &*decoded.next };
    assert_eq!(decoded.v, 1);
    assert_eq!(decoded_b.v, 2);
    // The cycle closes back on the root instance.
    assert_eq!(decoded_b.next.cast_const().cast::<()>(), graph.root().address());
}

#[test]
fn derived_records_carry_a_concrete_tag() {
    let mut derived = Derived {
        base: Base { k: 5 },
        m: 6,
    };
    let holder = Holder { item: &mut derived };

    let text = serialize_to_string(&reflect("Holder", &holder)).unwrap();
    // The standalone record is tagged with the concrete type while its
    // block headers carry the parent chain's names.
    assert!(text.contains("(Derived) 1 Base\n"));
    assert!(text.contains("1 Derived\n"));

    let graph = deserialize(text.as_bytes()).unwrap();
    let decoded: &Holder = unsafe { graph.root_value::<Holder>() };
    let item = unsafe { &*decoded.item };
    assert_eq!(item.base.k, 5);
    assert_eq!(item.m, 6);
}

#[test]
fn array_members_roundtrip_elementwise() {
    let grid = Grid {
        cells: [7, 8, 9, 10],
    };

    let text = serialize_to_string(&reflect("Grid", &grid)).unwrap();
    assert!(text.contains("\tcells\n\t\t7\n\t\t8\n\t\t9\n\t\t10\n"));

    let graph = deserialize(text.as_bytes()).unwrap();
    let decoded: &Grid = unsafe { graph.root_value::<Grid>() };
    assert_eq!(*decoded, grid);
}

#[test]
fn strings_keep_their_whitespace() {
    let msg = Msg {
        s: String::from("hello world"),
    };

    let text = serialize_to_string(&reflect("Msg", &msg)).unwrap();
    assert!(text.contains("\ts 11 hello world\n"));

    let graph = deserialize(text.as_bytes()).unwrap();
    let decoded: &Msg = unsafe { graph.root_value::<Msg>() };
    assert_eq!(decoded.s, "hello world");
}

#[test]
fn empty_strings_are_legal() {
    let msg = Msg { s: String::new() };

    let text = serialize_to_string(&reflect("Msg", &msg)).unwrap();
    let graph = deserialize(text.as_bytes()).unwrap();
    let decoded: &Msg = unsafe { graph.root_value::<Msg>() };
    assert_eq!(decoded.s, "");
}

#[test]
fn reserialization_is_byte_identical() {
    let mut b = Node {
        v: 2,
        next: std::ptr::null_mut(),
    };
    let a = Node {
        v: 1,
        next: &mut b,
    };

    let first = serialize_to_string(&reflect("Node", &a)).unwrap();
    let graph = deserialize(first.as_bytes()).unwrap();
    let second = serialize_to_string(graph.root()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn inline_owner_wins_when_seen_inline_first() {
    let mut outer = Outer {
        first: Inner { id: 9 },
        alias: std::ptr::null_mut(),
    };
    outer.alias = &mut outer.first;

    let text = serialize_to_string(&reflect("Outer", &outer)).unwrap();
    // Two table entries, but only the container emits a record; the shared
    // Inner appears once, nested inline.
    assert!(text.starts_with("2\n"));
    assert_eq!(text.matches("Inner\n").count(), 1);

    let graph = deserialize(text.as_bytes()).unwrap();
    let decoded: &Outer = unsafe { graph.root_value::<Outer>() };
    assert_eq!(decoded.first.id, 9);
    assert_eq!(decoded.alias.cast_const(), &decoded.first as *const Inner);
}

#[test]
fn inline_owner_wins_when_seen_through_pointer_first() {
    let mut chain = Chain {
        link: std::ptr::null_mut(),
        tail: Inner { id: 4 },
    };
    chain.link = &mut chain.tail;

    let text = serialize_to_string(&reflect("Chain", &chain)).unwrap();
    assert!(text.starts_with("2\n"));
    assert_eq!(text.matches("Inner\n").count(), 1);

    let graph = deserialize(text.as_bytes()).unwrap();
    let decoded: &Chain = unsafe { graph.root_value::<Chain>() };
    assert_eq!(decoded.tail.id, 4);
    assert_eq!(decoded.link.cast_const(), &decoded.tail as *const Inner);
}

#[test]
fn pointer_indices_are_range_checked() {
    register_sample_types();
    let result = deserialize(b"1\n0 Node\n[\n\tv 1\n\tnext 5\n]\n");
    assert!(matches!(
        result,
        Err(ReflectionError::IndexOutOfRange { index: 5, len: 1 })
    ));
}

#[test]
fn unknown_members_are_malformed() {
    register_sample_types();
    let result = deserialize(b"1\n0 Foo\n[\n\tz 1\n]\n");
    assert!(matches!(
        result,
        Err(ReflectionError::MalformedStream { .. })
    ));
}

#[test]
fn missing_records_fail_pointer_patching() {
    register_sample_types();
    // Entry 1 is referenced but its record never appears.
    let result = deserialize(b"2\n0 Node\n[\n\tv 1\n\tnext 1\n]\n");
    assert!(result.is_err());
}

#[test]
fn dropping_the_graph_releases_its_instances() {
    let mut b = Node {
        v: 2,
        next: std::ptr::null_mut(),
    };
    let a = Node {
        v: 1,
        next: &mut b,
    };

    let text = serialize_to_string(&reflect("Node", &a)).unwrap();
    let graph = deserialize(text.as_bytes()).unwrap();
    drop(graph);
}

#[test]
fn extracted_roots_outlive_the_graph() {
    let foo = Foo { x: 1, y: 2.0 };
    let text = serialize_to_string(&reflect("Foo", &foo)).unwrap();

    let graph = deserialize(text.as_bytes()).unwrap();
    let root = graph.into_root();
    let decoded: &Foo = unsafe { root.value::<Foo>() };
    assert_eq!(decoded.x, 1);
}
