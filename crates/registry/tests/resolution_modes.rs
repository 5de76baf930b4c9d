//! Singleton, unique and deep-unique resolution, including aliases and
//! the parent fallback.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use lazy_registry::prelude::*;
use test_case::test_case;

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Leaf {
    serial: usize,
}

#[derive(Debug)]
struct Branch {
    leaf: Arc<Leaf>,
}

impl Construct for Branch {
    fn parameters() -> Vec<ParamSlot> {
        vec![ParamSlot::of::<Leaf>("leaf")]
    }

    fn construct(args: &mut Arguments) -> Result<Self> {
        Ok(Self { leaf: args.take()? })
    }
}

#[derive(Debug)]
struct Tree {
    branch: Arc<Branch>,
}

impl Construct for Tree {
    fn parameters() -> Vec<ParamSlot> {
        vec![ParamSlot::of::<Branch>("branch")]
    }

    fn construct(args: &mut Arguments) -> Result<Self> {
        Ok(Self {
            branch: args.take()?,
        })
    }
}

/// Registry with `Tree -> Branch -> Leaf`, where `Leaf` counts its builds.
fn tree_registry() -> (Registry, Arc<AtomicUsize>) {
    let registry = Registry::new();
    let builds = Arc::new(AtomicUsize::new(0));
    let builds_c = Arc::clone(&builds);
    registry
        .define(&Identifier::<Leaf>::of(), move |_| {
            Ok(Leaf {
                serial: builds_c.fetch_add(1, Ordering::SeqCst),
            })
        })
        .unwrap();
    registry
        .provide::<Branch>([Param::dependency(&Identifier::<Leaf>::of())])
        .unwrap();
    registry
        .provide::<Tree>([Param::dependency(&Identifier::<Branch>::of())])
        .unwrap();
    (registry, builds)
}

fn tree() -> Identifier<Tree> {
    Identifier::of()
}

// ---------------------------------------------------------------------------
// Mode table
// ---------------------------------------------------------------------------

#[test_case(Mode::Singleton, true, true ; "singleton shares everything")]
#[test_case(Mode::Unique, false, true ; "unique shares dependencies")]
#[test_case(Mode::DeepUnique, false, false ; "deep unique shares nothing")]
fn second_request_sharing(mode: Mode, same_top: bool, same_branch: bool) {
    let (registry, _) = tree_registry();

    let first = registry.resolve_with(&tree(), mode).unwrap();
    let second = registry.resolve_with(&tree(), mode).unwrap();

    assert_eq!(Arc::ptr_eq(&first, &second), same_top);
    assert_eq!(Arc::ptr_eq(&first.branch, &second.branch), same_branch);
}

#[test_case(Mode::Singleton, 3 ; "singleton caches the whole tree")]
#[test_case(Mode::Unique, 2 ; "unique caches dependencies only")]
#[test_case(Mode::DeepUnique, 0 ; "deep unique caches nothing")]
fn cache_after_one_request(mode: Mode, cached: usize) {
    let (registry, _) = tree_registry();

    registry.resolve_with(&tree(), mode).unwrap();

    assert_eq!(registry.stats().unwrap().singletons, cached);
}

// ---------------------------------------------------------------------------
// Unique / deep-unique
// ---------------------------------------------------------------------------

#[test]
fn unique_reuses_cached_dependencies() {
    let (registry, builds) = tree_registry();
    let cached = registry.resolve(&tree()).unwrap();

    let fresh = registry.resolve_with(&tree(), Mode::Unique).unwrap();

    assert!(!Arc::ptr_eq(&cached, &fresh));
    assert!(Arc::ptr_eq(&cached.branch, &fresh.branch));
    assert_eq!(builds.load(Ordering::SeqCst), 1);
    assert!(Arc::ptr_eq(&cached, &registry.resolve(&tree()).unwrap()));
}

#[test]
fn deep_unique_rebuilds_every_level() {
    let (registry, builds) = tree_registry();
    let cached = registry.resolve(&tree()).unwrap();

    let deep = registry.resolve_with(&tree(), Mode::DeepUnique).unwrap();

    assert!(!Arc::ptr_eq(&cached.branch, &deep.branch));
    assert!(!Arc::ptr_eq(&cached.branch.leaf, &deep.branch.leaf));
    assert_eq!(deep.branch.leaf.serial, 1);
    assert_eq!(builds.load(Ordering::SeqCst), 2);
    assert!(Arc::ptr_eq(&cached, &registry.resolve(&tree()).unwrap()));
}

#[test]
fn deep_unique_propagates_through_builder_context() {
    let registry = Registry::new();
    registry
        .define(&Identifier::<Leaf>::of(), |_| Ok(Leaf { serial: 0 }))
        .unwrap();
    registry
        .define(&Identifier::<Branch>::of(), |ctx| {
            assert_eq!(ctx.mode(), Mode::DeepUnique);
            Ok(Branch {
                leaf: ctx.resolve(&Identifier::<Leaf>::of())?,
            })
        })
        .unwrap();

    let first = registry
        .resolve_with(&Identifier::<Branch>::of(), Mode::DeepUnique)
        .unwrap();
    let second = registry
        .resolve_with(&Identifier::<Branch>::of(), Mode::DeepUnique)
        .unwrap();

    assert!(!Arc::ptr_eq(&first.leaf, &second.leaf));
}

#[test]
fn unique_builder_sees_singleton_construction_mode() {
    let registry = Registry::new();
    registry
        .define(&Identifier::<Leaf>::of(), |ctx| {
            assert_eq!(ctx.mode(), Mode::Singleton);
            Ok(Leaf { serial: 0 })
        })
        .unwrap();

    registry
        .resolve_with(&Identifier::<Leaf>::of(), Mode::Unique)
        .unwrap();
    assert!(!registry.is_cached(&Identifier::<Leaf>::of()).unwrap());
}

// ---------------------------------------------------------------------------
// Aliases
// ---------------------------------------------------------------------------

#[test]
fn alias_shares_the_target_singleton() {
    let (registry, _) = tree_registry();
    let favourite = injection_key::<Tree>("favourite");
    registry.alias(&favourite, &tree()).unwrap();

    let via_alias = registry.resolve(&favourite).unwrap();

    assert!(Arc::ptr_eq(&via_alias, &registry.resolve(&tree()).unwrap()));
}

#[test]
fn unique_alias_resolves_target_as_singleton() {
    let (registry, _) = tree_registry();
    let favourite = injection_key::<Tree>("favourite");
    registry.alias(&favourite, &tree()).unwrap();

    let first = registry.resolve_with(&favourite, Mode::Unique).unwrap();
    let second = registry.resolve_with(&favourite, Mode::Unique).unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert!(!registry.is_cached(&favourite).unwrap());
}

#[test]
fn deep_unique_alias_rebuilds_target() {
    let (registry, _) = tree_registry();
    let favourite = injection_key::<Tree>("favourite");
    registry.alias(&favourite, &tree()).unwrap();

    let first = registry.resolve_with(&favourite, Mode::DeepUnique).unwrap();
    let second = registry.resolve_with(&favourite, Mode::DeepUnique).unwrap();

    assert!(!Arc::ptr_eq(&first, &second));
}

#[test]
fn alias_to_missing_target_reports_target() {
    let registry = Registry::new();
    let favourite = injection_key::<Tree>("favourite");
    registry.alias(&favourite, &tree()).unwrap();

    let err = registry.resolve(&favourite).unwrap_err();
    assert_eq!(err.identifier(), Some("Tree"));
}

// ---------------------------------------------------------------------------
// Parent fallback
// ---------------------------------------------------------------------------

#[test]
fn unique_request_falls_back_as_singleton() {
    let (root, builds) = tree_registry();
    let child = root.scope("req").unwrap().inherited().unwrap();
    let cached = root.resolve(&Identifier::<Leaf>::of()).unwrap();

    let via_child = child
        .resolve_with(&Identifier::<Leaf>::of(), Mode::Unique)
        .unwrap();

    assert!(Arc::ptr_eq(&cached, &via_child));
    assert_eq!(builds.load(Ordering::SeqCst), 1);
}

#[test]
fn deep_unique_request_falls_back_as_deep_unique() {
    let (root, builds) = tree_registry();
    let child = root.scope("req").unwrap().inherited().unwrap();
    let cached = root.resolve(&Identifier::<Leaf>::of()).unwrap();

    let via_child = child
        .resolve_with(&Identifier::<Leaf>::of(), Mode::DeepUnique)
        .unwrap();

    assert!(!Arc::ptr_eq(&cached, &via_child));
    assert_eq!(builds.load(Ordering::SeqCst), 2);
}
