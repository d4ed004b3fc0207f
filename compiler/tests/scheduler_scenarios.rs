// Read-scheduling scenarios over whole layouts: which expressions are read
// in each pass, with which flags, and in which order within a pass.

use bindc::analyzer::TypeResolver;
use bindc::binder::Binder;
use bindc::expr::{ExprId, ExprKind};
use bindc::flags::{Flag, FlagSet};
use bindc::model::Model;
use bindc::registry::ClassRegistry;
use bindc::schedule::{self, Schedule, Scheduler, SchedulerState};

const CLASSES: &str = r#"{"classes": [
    {"name": "com.example.User", "observable": true,
     "fields": [
        {"name": "name", "type": "java.lang.String"},
        {"name": "lastName", "type": "java.lang.String"},
        {"name": "finalField", "type": "int", "final": true},
        {"name": "subObj", "type": "com.example.SubObj"},
        {"name": "innerStaticInstance", "type": "com.example.User$InnerStaticClass", "static": true},
        {"name": "innerFinalStaticInstance", "type": "com.example.User$InnerStaticClass",
         "static": true, "final": true}
     ],
     "methods": [
        {"name": "getName", "type": "java.lang.String"},
        {"name": "getLastName", "type": "java.lang.String"},
        {"name": "getCond", "type": "boolean", "params": ["int"]},
        {"name": "getAnotherSubObj", "type": "com.example.SubObj"},
        {"name": "ourStaticMethod", "type": "boolean", "static": true}
     ]},
    {"name": "com.example.User$InnerStaticClass",
     "fields": [
        {"name": "finalField", "type": "int", "static": true, "final": true},
        {"name": "finalStaticField", "type": "int", "static": true, "final": true}
     ]},
    {"name": "com.example.SubObj",
     "fields": [{"name": "finalField", "type": "int", "final": true}]},
    {"name": "com.example.Text",
     "methods": [{"name": "isEmpty", "type": "boolean"}]},
    {"name": "com.example.Holder",
     "fields": [{"name": "count", "type": "android.databinding.ObservableInt"}]},
    {"name": "android.databinding.ObservableInt", "observable_field": true,
     "methods": [{"name": "get", "type": "int"}]},
    {"name": "android.view.View",
     "fields": [
        {"name": "VISIBLE", "type": "int", "static": true, "final": true},
        {"name": "GONE", "type": "int", "static": true, "final": true}
     ]}
]}"#;

const USER: &str = "com.example.User";

fn registry() -> ClassRegistry {
    ClassRegistry::from_json(CLASSES).unwrap()
}

fn sealed(variables: &[(&str, &str)], imports: &[(&str, &str)], bindings: &[&str]) -> Model {
    sealed_roots(variables, imports, bindings).0
}

/// Declare variables and imports, bind every expression, then seal.
fn sealed_roots(
    variables: &[(&str, &str)],
    imports: &[(&str, &str)],
    bindings: &[&str],
) -> (Model, Vec<ExprId>) {
    let registry = registry();
    let mut binder = Binder::new(&registry);
    for (alias, qualified) in imports {
        binder.add_import(alias, qualified).unwrap();
    }
    for (name, ty) in variables {
        binder.add_variable(name, ty).unwrap();
    }
    let roots = bindings
        .iter()
        .map(|binding| binder.parse(binding).unwrap_or_else(|d| panic!("{binding}: {d}")))
        .collect();
    binder.seal().unwrap();
    (binder.into_model(), roots)
}

fn vars<'a>(names: &[&'a str], ty: &'a str) -> Vec<(&'a str, &'a str)> {
    names.iter().map(|n| (*n, ty)).collect()
}

fn id(model: &Model, key: &str) -> ExprId {
    model
        .find(key)
        .unwrap_or_else(|| panic!("no expression `{key}`"))
}

fn keys(model: &Model, ids: &[ExprId]) -> Vec<String> {
    let mut keys: Vec<String> = ids.iter().map(|&i| model.expr(i).key().to_string()).collect();
    keys.sort();
    keys
}

#[track_caller]
fn assert_exact(model: &Model, actual: &[ExprId], expected: &[&str]) {
    let mut expected: Vec<String> = expected.iter().map(|k| k.to_string()).collect();
    expected.sort();
    assert_eq!(keys(model, actual), expected);
}

/// Expressions of `batch` whose dependencies are read or in `just_read`,
/// excluding `just_read` itself.
fn read_first(scheduler: &Scheduler<'_>, batch: &[ExprId], just_read: &[ExprId]) -> Vec<ExprId> {
    batch
        .iter()
        .copied()
        .filter(|&e| !just_read.contains(&e) && scheduler.should_read_now(e, just_read))
        .collect()
}

fn req(model: &Model, key: &str, branch: bool) -> Flag {
    model.expr(id(model, key)).requirement_flag(branch).unwrap()
}

fn flag_of(model: &Model, key: &str) -> Flag {
    model.expr(id(model, key)).flag().unwrap()
}

/// Union of the invalid flags of `keys`.
fn invalid_of(model: &Model, keys: &[&str]) -> FlagSet {
    let mut set = FlagSet::new();
    for key in keys {
        set.union_with(model.expr(id(model, key)).invalid_flags());
    }
    set
}

fn should_read(model: &Model, key: &str) -> FlagSet {
    model.expr(id(model, key)).should_read_flags().clone()
}

fn flags(list: &[Flag]) -> FlagSet {
    list.iter().copied().collect()
}

/// Sorted keys read in each pass of `schedule`.
fn pass_keys(model: &Model, schedule: &Schedule) -> Vec<Vec<String>> {
    schedule
        .passes
        .iter()
        .map(|pass| {
            let ids: Vec<ExprId> = pass.reads.iter().map(|r| r.expr).collect();
            keys(model, &ids)
        })
        .collect()
}

fn sorted(list: &[&str]) -> Vec<String> {
    let mut keys: Vec<String> = list.iter().map(|k| k.to_string()).collect();
    keys.sort();
    keys
}

// ── Conditionals ────────────────────────────────────────────────────────────

#[test]
fn predicate_operand_is_read_first() {
    let mut model = sealed(&vars(&["a", "b", "c"], "java.lang.String"), &[], &["a == null ? b : c"]);
    let scheduler = Scheduler::new(&mut model).unwrap();
    let batch = scheduler.should_read().unwrap();
    let model = scheduler.model();
    assert_exact(model, &batch, &["a", "(a == null)"]);
    let first = read_first(&scheduler, &batch, &[]);
    assert_eq!(first, vec![id(model, "a")]);
    assert!(!model.expr(first[0]).should_read_flags().is_empty());
}

#[test]
fn ternary_with_plus() {
    let mut model = sealed(
        &[("user", USER)],
        &[],
        &[r#"user.name + " " + (user.lastName ?? "")"#],
    );
    let ternary = r#"((user.lastName == null) ? "" : user.lastName)"#;
    let root = r#"((user.name + " ") + ((user.lastName == null) ? "" : user.lastName))"#;
    let mut scheduler = Scheduler::new(&mut model).unwrap();

    let batch = scheduler.should_read().unwrap();
    let m = scheduler.model();
    let mut just_read = read_first(&scheduler, &batch, &[]);
    assert_eq!(just_read, vec![id(m, "user")]);
    let next = read_first(&scheduler, &batch, &just_read);
    assert_exact(m, &next, &["user.name", "user.lastName"]);
    just_read.extend(next);
    let next = read_first(&scheduler, &batch, &just_read);
    assert_exact(m, &next, &[r#"(user.name + " ")"#, "(user.lastName == null)"]);
    just_read.extend(next);
    assert!(read_first(&scheduler, &batch, &just_read).is_empty());
    assert!(scheduler.mark_bits_read().unwrap());

    let batch = scheduler.should_read().unwrap();
    let m = scheduler.model();
    assert_eq!(batch.len(), 2);
    let first = read_first(&scheduler, &batch, &[]);
    assert_eq!(first, vec![id(m, ternary)]);
    let second = read_first(&scheduler, &batch, &first);
    assert_eq!(second, vec![id(m, root)]);
    assert!(!scheduler.mark_bits_read().unwrap());
    assert!(scheduler.should_read().unwrap().is_empty());
}

#[test]
fn ternary_inside_ternary() {
    let mut model = sealed(
        &vars(&["cond1", "cond2", "a", "b", "c"], "boolean"),
        &[],
        &["cond1 ? cond2 ? a : b : c"],
    );
    let outer = "(cond1 ? (cond2 ? a : b) : c)";
    let inner = "(cond2 ? a : b)";
    let mut scheduler = Scheduler::new(&mut model).unwrap();

    let batch = scheduler.should_read().unwrap();
    assert_exact(scheduler.model(), &batch, &["cond1"]);
    assert_eq!(read_first(&scheduler, &batch, &[]), batch);
    assert!(scheduler.mark_bits_read().unwrap());

    let batch = scheduler.should_read().unwrap();
    let m = scheduler.model();
    assert_exact(m, &batch, &["c", "cond2"]);
    assert_eq!(should_read(m, "c"), FlagSet::single(req(m, outer, false)));
    assert_eq!(should_read(m, inner), FlagSet::single(req(m, outer, true)));
    assert!(scheduler.mark_bits_read().unwrap());

    let batch = scheduler.should_read().unwrap();
    let m = scheduler.model();
    assert_exact(m, &batch, &["a", "b", outer, inner]);
    assert_eq!(should_read(m, "a"), FlagSet::single(req(m, inner, true)));
    assert_eq!(should_read(m, "b"), FlagSet::single(req(m, inner, false)));
    assert!(!scheduler.mark_bits_read().unwrap());
}

#[test]
fn requirement_flags_follow_branches() {
    let mut model = sealed(
        &vars(&["a", "b", "c", "d", "e"], "java.lang.String"),
        &[],
        &["a == null ? b == null ? c : d : e"],
    );
    let a_ternary = "((a == null) ? ((b == null) ? c : d) : e)";
    let b_ternary = "((b == null) ? c : d)";
    let mut scheduler = Scheduler::new(&mut model).unwrap();

    let batch = scheduler.should_read().unwrap();
    let m = scheduler.model();
    assert_exact(m, &batch, &["a", "(a == null)"]);
    assert!(should_read(m, "a").contains(flag_of(m, "a")));
    for var in ["b", "c", "d", "e"] {
        assert!(should_read(m, var).is_empty(), "{var}");
    }
    assert_eq!(read_first(&scheduler, &batch, &[]), vec![id(m, "a")]);
    assert!(scheduler.mark_bits_read().unwrap());

    let batch = scheduler.should_read().unwrap();
    let m = scheduler.model();
    assert_exact(m, &batch, &["e", "b", "(b == null)"]);
    assert_eq!(should_read(m, "e"), FlagSet::single(req(m, a_ternary, false)));
    assert_eq!(should_read(m, "b"), FlagSet::single(req(m, a_ternary, true)));
    assert_eq!(should_read(m, "(b == null)"), FlagSet::single(req(m, a_ternary, true)));
    assert!(scheduler.mark_bits_read().unwrap());

    let batch = scheduler.should_read().unwrap();
    let m = scheduler.model();
    assert_exact(m, &batch, &["c", "d", a_ternary, b_ternary]);
    assert_eq!(should_read(m, "c"), FlagSet::single(req(m, b_ternary, true)));
    assert_eq!(should_read(m, "d"), FlagSet::single(req(m, b_ternary, false)));
    assert_eq!(should_read(m, b_ternary), FlagSet::single(req(m, a_ternary, true)));
    let root = should_read(m, a_ternary);
    assert_eq!(root.len(), 6);
    for var in ["a", "b", "c", "d", "e"] {
        assert!(root.contains(flag_of(m, var)), "{var}");
    }
    assert_exact(m, &read_first(&scheduler, &batch, &[]), &["c", "d"]);
    assert!(!scheduler.mark_bits_read().unwrap());
}

#[test]
fn post_conditional_dependencies() {
    let mut variables = vec![("u1", USER), ("u2", USER)];
    variables.extend(vars(&["a", "b", "c", "d", "e"], "int"));
    let mut model = sealed(
        &variables,
        &[],
        &[
            "a > b ? u1.name : u2.name",
            "b > c ? u1.getCond(d) ? u1.lastName : u2.lastName : `xx` + u2.getCond(e)",
        ],
    );
    let ab = "((a > b) ? u1.name : u2.name)";
    let inner = "(u1.getCond(d) ? u1.lastName : u2.lastName)";
    let bc = r#"((b > c) ? (u1.getCond(d) ? u1.lastName : u2.lastName) : ("xx" + u2.getCond(e)))"#;
    let xx_plus = r#"("xx" + u2.getCond(e))"#;
    let mut scheduler = Scheduler::new(&mut model).unwrap();

    let batch = scheduler.should_read().unwrap();
    let m = scheduler.model();
    assert_exact(m, &batch, &["a", "b", "c", "(a > b)", "(b > c)"]);
    assert_exact(m, &read_first(&scheduler, &batch, &[]), &["a", "b", "c"]);
    let ab_invalid = invalid_of(m, &["a", "b", "u1", "u2", "u1.name", "u2.name"]);
    let bc_invalid = invalid_of(
        m,
        &["b", "c", "u1", "d", "u1.lastName", "u2.lastName", "e"],
    );
    let mut both = ab_invalid.clone();
    both.union_with(&bc_invalid);
    assert_eq!(should_read(m, "a"), ab_invalid);
    assert_eq!(should_read(m, "b"), both);
    assert_eq!(should_read(m, "c"), bc_invalid);
    assert_eq!(should_read(m, "(a > b)"), ab_invalid);
    assert_eq!(should_read(m, "(b > c)"), bc_invalid);
    assert!(scheduler.mark_bits_read().unwrap());

    let batch = scheduler.should_read().unwrap();
    let m = scheduler.model();
    assert_exact(
        m,
        &batch,
        &[
            "d",
            "e",
            "u1",
            "u2",
            "u1.getCond(d)",
            "u2.getCond(e)",
            xx_plus,
            ab,
            "u1.name",
            "u2.name",
        ],
    );
    assert_exact(m, &read_first(&scheduler, &batch, &[]), &["d", "e", "u1", "u2"]);
    assert_eq!(should_read(m, "d"), FlagSet::single(req(m, bc, true)));
    assert_eq!(should_read(m, "e"), FlagSet::single(req(m, bc, false)));
    assert_eq!(should_read(m, "u1"), flags(&[req(m, bc, true), req(m, ab, true)]));
    assert_eq!(should_read(m, "u2"), flags(&[req(m, bc, false), req(m, ab, false)]));
    assert_eq!(should_read(m, "u1.getCond(d)"), FlagSet::single(req(m, bc, true)));
    assert_eq!(should_read(m, "u2.getCond(e)"), FlagSet::single(req(m, bc, false)));
    assert_eq!(should_read(m, xx_plus), FlagSet::single(req(m, bc, false)));
    assert_eq!(should_read(m, ab), ab_invalid);
    assert_eq!(should_read(m, "u1.name"), FlagSet::single(req(m, ab, true)));
    assert_eq!(should_read(m, "u2.name"), FlagSet::single(req(m, ab, false)));
    assert!(scheduler.mark_bits_read().unwrap());

    // u2 is read again for the inner ternary: its earlier read only covered
    // the other branch requirements.
    let batch = scheduler.should_read().unwrap();
    let m = scheduler.model();
    assert_exact(m, &batch, &["u2", "u1.lastName", "u2.lastName", inner, bc]);
    assert_exact(m, &read_first(&scheduler, &batch, &[]), &["u1.lastName", "u2"]);
    assert_eq!(should_read(m, "u1.lastName"), FlagSet::single(req(m, inner, true)));
    assert_eq!(should_read(m, "u2.lastName"), FlagSet::single(req(m, inner, false)));
    assert_eq!(should_read(m, "u2"), FlagSet::single(req(m, inner, false)));
    assert_eq!(should_read(m, inner), FlagSet::single(req(m, bc, true)));
    assert_eq!(should_read(m, bc), bc_invalid);
}

#[test]
fn logical_operators_guard_their_right_operand() {
    let mut model = sealed(&vars(&["a", "b", "c"], "boolean"), &[], &["a && b", "a || c"]);
    let mut scheduler = Scheduler::new(&mut model).unwrap();

    let batch = scheduler.should_read().unwrap();
    assert_exact(scheduler.model(), &batch, &["a"]);
    assert!(scheduler.mark_bits_read().unwrap());

    let batch = scheduler.should_read().unwrap();
    let m = scheduler.model();
    assert_exact(m, &batch, &["b", "c", "(a && b)", "(a || c)"]);
    assert_eq!(should_read(m, "b"), FlagSet::single(req(m, "(a && b)", true)));
    assert_eq!(should_read(m, "c"), FlagSet::single(req(m, "(a || c)", false)));
    assert!(!scheduler.mark_bits_read().unwrap());
}

#[test]
fn short_circuit_predicate_sharing_a_branch() {
    let mut model = sealed(&vars(&["a", "b", "c"], "boolean"), &[], &["(b || c) ? b : a"]);
    let or = "(b || c)";
    let root = "((b || c) ? b : a)";
    let mut scheduler = Scheduler::new(&mut model).unwrap();

    assert_exact(scheduler.model(), &scheduler.should_read().unwrap(), &["b"]);
    assert!(scheduler.mark_bits_read().unwrap());

    // b is still owed the true-branch requirement, but it was already read
    // for everything `b || c` needs.
    let batch = scheduler.should_read().unwrap();
    let m = scheduler.model();
    assert!(!m.expr(id(m, "b")).is_read());
    assert!(should_read(m, "b").is_empty());
    assert_exact(m, &batch, &["c", or]);
    assert_eq!(should_read(m, "c"), FlagSet::single(req(m, or, false)));
    assert_eq!(should_read(m, or), invalid_of(m, &[root]));
    assert_eq!(read_first(&scheduler, &batch, &[]), vec![id(m, "c")]);
    assert_eq!(scheduler.order_batch(&batch).unwrap().len(), 2);
    assert!(scheduler.mark_bits_read().unwrap());

    let batch = scheduler.should_read().unwrap();
    let m = scheduler.model();
    assert!(m.expr(id(m, "b")).is_read());
    assert_exact(m, &batch, &["a", root]);
    assert_eq!(should_read(m, "a"), FlagSet::single(req(m, root, false)));
    assert!(!scheduler.mark_bits_read().unwrap());
    assert_eq!(scheduler.state(), SchedulerState::Exhausted);
    assert!(scheduler.pending().unwrap().is_empty());
}

#[test]
fn null_or_empty_check_schedules_every_read() {
    let mut model = sealed(
        &[("s", "com.example.Text")],
        &[],
        &[r#"s == null || s.isEmpty() ? "" : s"#],
    );
    let or = "((s == null) || s.isEmpty())";
    let root = r#"(((s == null) || s.isEmpty()) ? "" : s)"#;
    let schedule = schedule::plan(&mut model).unwrap();
    assert_eq!(
        pass_keys(&model, &schedule),
        vec![
            sorted(&["s", "(s == null)"]),
            sorted(&["s", "s.isEmpty()", or]),
            sorted(&[root]),
        ]
    );
    let second = &schedule.passes[1].reads;
    assert_eq!(second[0].expr, id(&model, "s"));
    assert_eq!(second[0].flags, FlagSet::single(req(&model, or, false)));
    assert_eq!(second.iter().map(|r| r.layer).max(), Some(2));
    assert!(model.pending_expressions().unwrap().is_empty());
}

#[test]
fn nested_predicate_reused_as_its_own_branch() {
    let mut model = sealed(
        &vars(&["a", "b", "c", "d"], "boolean"),
        &[],
        &["b ? ((a ? c : d) ? a : false) : false"],
    );
    let inner = "(a ? c : d)";
    let middle = "((a ? c : d) ? a : false)";
    let outer = "(b ? ((a ? c : d) ? a : false) : false)";
    let schedule = schedule::plan(&mut model).unwrap();
    assert_eq!(
        pass_keys(&model, &schedule),
        vec![
            sorted(&["b"]),
            sorted(&["a"]),
            sorted(&["c", "d", inner]),
            sorted(&[middle, outer]),
        ]
    );
    // a is read once, for the outer branch only; the middle ternary reuses
    // that value instead of waiting on its own requirement.
    assert_eq!(schedule.passes[1].reads[0].flags, FlagSet::single(req(&model, outer, true)));
    assert!(model.expr(id(&model, outer)).is_read());
    assert!(model.pending_expressions().unwrap().is_empty());
}

// ── Shared operands across bindings ─────────────────────────────────────────

#[test]
fn circular_dependency() {
    let mut model = sealed(&vars(&["a", "b"], "int"), &[], &["a > 3 ? a : b"]);
    let mut scheduler = Scheduler::new(&mut model).unwrap();
    assert_exact(scheduler.model(), &scheduler.should_read().unwrap(), &["a", "(a > 3)"]);
    assert!(scheduler.mark_bits_read().unwrap());
    assert_exact(
        scheduler.model(),
        &scheduler.should_read().unwrap(),
        &["b", "((a > 3) ? a : b)"],
    );
    assert!(!scheduler.mark_bits_read().unwrap());
}

#[test]
fn nested_circular_dependency() {
    let mut model = sealed(&vars(&["a", "b", "c"], "int"), &[], &["a > 3 ? c > 4 ? a : b : c"]);
    let outer = "((a > 3) ? ((c > 4) ? a : b) : c)";
    let mut scheduler = Scheduler::new(&mut model).unwrap();
    assert_exact(scheduler.model(), &scheduler.should_read().unwrap(), &["a", "(a > 3)"]);
    assert!(scheduler.mark_bits_read().unwrap());

    let batch = scheduler.should_read().unwrap();
    let m = scheduler.model();
    assert_exact(m, &batch, &["c", "(c > 4)"]);
    assert_eq!(should_read(m, "c"), flags(&[req(m, outer, true), req(m, outer, false)]));
    assert_eq!(should_read(m, "(c > 4)"), FlagSet::single(req(m, outer, true)));
}

#[test]
fn inter_expression_circular_dependency() {
    let mut model = sealed(&vars(&["a", "b"], "int"), &[], &["a > 3 ? a : b", "b > 3 ? b : a"]);
    let mut scheduler = Scheduler::new(&mut model).unwrap();
    assert_exact(
        scheduler.model(),
        &scheduler.should_read().unwrap(),
        &["a", "b", "(a > 3)", "(b > 3)"],
    );
    assert!(scheduler.mark_bits_read().unwrap());
    assert_exact(
        scheduler.model(),
        &scheduler.should_read().unwrap(),
        &["((a > 3) ? a : b)", "((b > 3) ? b : a)"],
    );
}

#[test]
fn inter_expression_circular_dependency_on_predicates() {
    let mut model = sealed(&vars(&["a", "b"], "boolean"), &[], &["a ? b : true", "b ? a : false"]);
    let ab = "(a ? b : true)";
    let ba = "(b ? a : false)";
    let mut scheduler = Scheduler::new(&mut model).unwrap();

    let batch = scheduler.should_read().unwrap();
    assert_exact(scheduler.model(), &batch, &["a", "b"]);
    assert_exact(scheduler.model(), &read_first(&scheduler, &batch, &[]), &["a", "b"]);
    assert!(scheduler.mark_bits_read().unwrap());

    // a and b again, now for the branch of the other ternary.
    let batch = scheduler.should_read().unwrap();
    let m = scheduler.model();
    assert_exact(m, &batch, &["a", "b", ab, ba]);
    let just_read = read_first(&scheduler, &batch, &[]);
    assert_exact(m, &just_read, &["a", "b"]);
    assert_exact(m, &read_first(&scheduler, &batch, &just_read), &[ab, ba]);
    assert!(!scheduler.mark_bits_read().unwrap());
    assert!(scheduler.should_read().unwrap().is_empty());
}

#[test]
fn inter_expression_circular_dependency_with_shared_branch() {
    let mut model = sealed(&vars(&["a", "b", "c"], "boolean"), &[], &["a ? b : c", "b ? a : c"]);
    let mut scheduler = Scheduler::new(&mut model).unwrap();
    assert_exact(scheduler.model(), &scheduler.should_read().unwrap(), &["a", "b"]);
    assert!(scheduler.mark_bits_read().unwrap());
    assert_exact(
        scheduler.model(),
        &scheduler.should_read().unwrap(),
        &["a", "b", "c", "(a ? b : c)", "(b ? a : c)"],
    );
    scheduler.mark_bits_read().unwrap();
    assert!(scheduler.should_read().unwrap().is_empty());
}

#[test]
fn inter_expression_circular_dependency_layers() {
    let mut model = sealed(
        &vars(&["a", "b", "c", "d"], "boolean"),
        &[],
        &["c ? (a ? d : false) : false", "a ? b : true", "b ? a : false"],
    );
    let c_ternary = "(c ? (a ? d : false) : false)";
    let inner = "(a ? d : false)";
    let ab = "(a ? b : true)";
    let ba = "(b ? a : false)";
    let mut scheduler = Scheduler::new(&mut model).unwrap();

    let batch = scheduler.should_read().unwrap();
    let m = scheduler.model();
    assert_exact(m, &batch, &["c", "a", "b"]);
    let just_read = read_first(&scheduler, &batch, &[]);
    assert_exact(m, &just_read, &["c", "a", "b"]);
    assert!(read_first(&scheduler, &batch, &just_read).is_empty());
    assert!(scheduler.mark_bits_read().unwrap());

    let batch = scheduler.should_read().unwrap();
    let m = scheduler.model();
    assert_exact(m, &batch, &["a", "b", "d", inner, c_ternary, ab, ba]);
    let mut just_read = read_first(&scheduler, &batch, &[]);
    assert_exact(m, &just_read, &["a", "b", "d"]);
    let next = read_first(&scheduler, &batch, &just_read);
    assert_exact(m, &next, &[inner, ab, ba]);
    just_read.extend(next);
    let next = read_first(&scheduler, &batch, &just_read);
    assert_exact(m, &next, &[c_ternary]);
    just_read.extend(next);
    assert!(read_first(&scheduler, &batch, &just_read).is_empty());

    let layers = scheduler.order_batch(&batch).unwrap();
    assert_eq!(layers.len(), 3);
    assert!(!scheduler.mark_bits_read().unwrap());
}

#[test]
fn inter_expression_dependency_not_ready_yet() {
    let mut model = sealed(
        &vars(&["a", "b", "c", "d", "e"], "boolean"),
        &[],
        &["c ? (a ? d : false) : false", "b ? a : false", "e ? a : false"],
    );
    let mut scheduler = Scheduler::new(&mut model).unwrap();
    assert_exact(scheduler.model(), &scheduler.should_read().unwrap(), &["b", "c", "e"]);
    assert!(scheduler.mark_bits_read().unwrap());
    assert_exact(
        scheduler.model(),
        &scheduler.should_read().unwrap(),
        &["a", "(b ? a : false)", "(e ? a : false)"],
    );
    assert!(scheduler.mark_bits_read().unwrap());
    assert_exact(
        scheduler.model(),
        &scheduler.should_read().unwrap(),
        &["d", "(a ? d : false)", "(c ? (a ? d : false) : false)"],
    );
    assert!(!scheduler.mark_bits_read().unwrap());
}

// ── Static and final members ────────────────────────────────────────────────

#[test]
fn no_flags_for_non_binding_static() {
    let model = sealed(&[("a", "int")], &[], &["a * (3 + 2)"]);
    assert_eq!(model.expr(id(&model, "(3 + 2)")).invalid_flags().len(), 1);
    assert_eq!(model.expr(id(&model, "a")).invalid_flags().len(), 2);
    assert_eq!(model.invalidateable_limit(), 2);
}

#[test]
fn flags_for_binding_static() {
    let model = sealed(&[("a", "int")], &[], &["3 + 2", "a * (3 + 2)"]);
    let static_sum = model.expr(id(&model, "(3 + 2)"));
    assert!(static_sum.is_binding());
    assert!(!static_sum.is_dynamic());
    assert_eq!(static_sum.invalid_flags().len(), 1);
    assert_eq!(model.expr(id(&model, "a")).invalid_flags().len(), 2);
    assert_eq!(model.invalidateable_limit(), 2);
}

#[test]
fn final_field_of_a_variable() {
    let mut model = sealed(&[("user", USER)], &[], &["user.finalField"]);
    assert!(model.expr(id(&model, "user.finalField")).is_dynamic());
    let mut scheduler = Scheduler::new(&mut model).unwrap();
    assert_exact(
        scheduler.model(),
        &scheduler.should_read().unwrap(),
        &["user", "user.finalField"],
    );
    assert!(!scheduler.mark_bits_read().unwrap());
    assert!(scheduler.should_read().unwrap().is_empty());
}

#[test]
fn final_field_of_a_field() {
    let mut model = sealed(&[("user", USER)], &[], &["user.subObj.finalField"]);
    let mut scheduler = Scheduler::new(&mut model).unwrap();
    assert_exact(
        scheduler.model(),
        &scheduler.should_read().unwrap(),
        &["user", "user.subObj", "user.subObj.finalField"],
    );
    scheduler.mark_bits_read().unwrap();
    assert!(scheduler.should_read().unwrap().is_empty());
}

#[test]
fn final_field_of_a_method() {
    let mut model = sealed(&[("user", USER)], &[], &["user.anotherSubObj.finalField"]);
    let mut scheduler = Scheduler::new(&mut model).unwrap();
    assert_exact(
        scheduler.model(),
        &scheduler.should_read().unwrap(),
        &["user", "user.anotherSubObj", "user.anotherSubObj.finalField"],
    );
    scheduler.mark_bits_read().unwrap();
    assert!(scheduler.should_read().unwrap().is_empty());
}

#[test]
fn final_of_a_class() {
    let (mut model, roots) = sealed_roots(&[], &[("View", "android.view.View")], &["View.VISIBLE"]);
    assert!(!model.expr(roots[0]).is_dynamic());
    let scheduler = Scheduler::new(&mut model).unwrap();
    assert!(scheduler.should_read().unwrap().is_empty());
}

#[test]
fn static_field_of_instance() {
    let mut model = sealed(&[("myView", "android.view.View")], &[], &["myView.VISIBLE"]);
    let field = model.expr(id(&model, "myView.VISIBLE"));
    assert!(!field.is_dynamic());
    let receiver = model.expr(field.children()[0]);
    assert!(matches!(receiver.kind(), ExprKind::StaticIdentifier { .. }));
    assert_eq!(
        receiver.resolved_type().map(|c| c.name.as_str()),
        Some("android.view.View")
    );
    assert_eq!(model.imports().get("View"), Some("android.view.View"));
    let scheduler = Scheduler::new(&mut model).unwrap();
    assert!(scheduler.should_read().unwrap().is_empty());
}

#[test]
fn static_members_through_instances_share_one_receiver() {
    let (model, roots) = sealed_roots(
        &[("v", "android.view.View"), ("w", "android.view.View")],
        &[],
        &["v.VISIBLE", "w.GONE", "android.view.View.GONE"],
    );
    let receivers: Vec<ExprId> = roots.iter().map(|&r| model.expr(r).children()[0]).collect();
    assert_eq!(receivers[0], receivers[1]);
    assert_eq!(receivers[1], receivers[2]);
    assert!(matches!(
        model.expr(receivers[0]).kind(),
        ExprKind::StaticIdentifier { qualified, .. } if qualified == "android.view.View"
    ));
    let statics = model
        .iter()
        .filter(|e| matches!(e.kind(), ExprKind::StaticIdentifier { .. }))
        .count();
    assert_eq!(statics, 1);
    assert_ne!(roots[1], roots[2]);
    for &root in &roots {
        assert!(!model.expr(root).is_dynamic());
        assert!(model.expr(receivers[0]).parents().contains(&root));
    }
}

#[test]
fn observable_field_is_split_into_wrapper_and_read() {
    let registry = registry();
    let mut binder = Binder::new(&registry);
    binder.add_variable("h", "com.example.Holder").unwrap();
    let plus = binder.parse("h.count + 1").unwrap();
    let field = binder.parse("h.count").unwrap();
    let size = binder.model().len();
    assert_eq!(binder.parse("h.count").unwrap(), field);
    assert_eq!(binder.parse("h.count + 1").unwrap(), plus);
    assert_eq!(binder.model().len(), size);
    binder.seal().unwrap();

    let model = binder.model();
    let h = id(model, "h");
    let wrapper = id(model, "h..count");
    assert_eq!(model.expr(field).key(), "h.count");
    assert_eq!(model.expr(plus).children()[0], field);
    assert_eq!(model.expr(field).children(), &[wrapper]);
    assert_eq!(model.expr(wrapper).children(), &[h]);
    assert_eq!(model.expr(wrapper).parents(), &[field]);
    assert!(model.expr(h).parents().contains(&wrapper));
    assert!(!model.expr(h).parents().contains(&field));
    assert_eq!(
        model.expr(wrapper).resolved_type().map(|c| c.name.as_str()),
        Some("android.databinding.ObservableInt")
    );
    assert_eq!(model.expr(field).resolved_type().map(|c| c.name.as_str()), Some("int"));
    assert!(model.expr(wrapper).flag().is_some());
    assert!(model.expr(field).is_dynamic());
}

#[test]
fn on_demand_import_conflict() {
    let registry = registry();
    let mut binder = Binder::new(&registry);
    binder.add_variable("u", "android.view.View").unwrap();
    binder.add_import("View", USER).unwrap();
    let view = registry.find_class("android.view.View").unwrap();
    let static_id = binder.model_mut().static_identifier_for(&view).unwrap();
    binder.seal().unwrap();
    let model = binder.model();
    assert_eq!(model.imports().get("View1"), Some("android.view.View"));
    match model.expr(static_id).kind() {
        ExprKind::StaticIdentifier { alias, qualified } => {
            assert_eq!(alias, "View1");
            assert_eq!(qualified, "android.view.View");
        }
        other => panic!("expected a static identifier, got {other:?}"),
    }
}

#[test]
fn on_demand_import_already_imported() {
    let registry = registry();
    let mut binder = Binder::new(&registry);
    let ux = binder.add_import("UX", USER).unwrap();
    binder.add_variable("u", USER).unwrap();
    let user = registry.find_class(USER).unwrap();
    let static_id = binder.model_mut().static_identifier_for(&user).unwrap();
    binder.seal().unwrap();
    assert_eq!(ux, static_id);
}

#[test]
fn static_method_of_instance() {
    let model = sealed(&[("user", USER)], &[], &["user.ourStaticMethod()"]);
    let call = model.expr(id(&model, "user.ourStaticMethod()"));
    assert!(call.is_dynamic());
    let target = model.expr(call.children()[0]);
    assert!(matches!(target.kind(), ExprKind::StaticIdentifier { .. }));
    assert_eq!(target.resolved_type().map(|c| c.name.as_str()), Some(USER));
}

#[test]
fn final_of_static_field() {
    let (mut model, roots) = sealed_roots(
        &[],
        &[("UX", USER)],
        &["UX.innerStaticInstance.finalStaticField"],
    );
    assert!(!model.expr(roots[0]).is_dynamic());
    let scheduler = Scheduler::new(&mut model).unwrap();
    assert!(scheduler.should_read().unwrap().is_empty());
}

#[test]
fn final_of_final_static_field() {
    let (mut model, roots) = sealed_roots(
        &[],
        &[("User", USER)],
        &["User.innerFinalStaticInstance.finalStaticField"],
    );
    assert!(!model.expr(roots[0]).is_dynamic());
    let scheduler = Scheduler::new(&mut model).unwrap();
    assert!(scheduler.should_read().unwrap().is_empty());
}
