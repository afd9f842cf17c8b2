use recalc_dag::{Dag, DagError};

fn add_input(dag: &mut Dag, id: &str) {
    dag.add_node(id, false, None).expect("add input");
}

fn add_formula(dag: &mut Dag, id: &str, formula: &str, deps: &[&str]) {
    dag.add_node(id, true, Some(formula.to_string()))
        .expect("add formula");
    for dep in deps {
        dag.add_dependency(id, dep).expect("add dependency");
    }
}

fn position(order: &[String], id: &str) -> usize {
    order
        .iter()
        .position(|n| n == id)
        .unwrap_or_else(|| panic!("{id} missing from order"))
}

#[test]
fn dependencies_precede_dependents() {
    let mut dag = Dag::new();
    add_formula(&mut dag, "Sheet1.D", "=C1*2", &[]);
    add_input(&mut dag, "Sheet1.A");
    add_input(&mut dag, "Sheet1.B");
    add_formula(&mut dag, "Sheet1.C", "=A1+B1", &["Sheet1.A", "Sheet1.B"]);
    dag.add_dependency("Sheet1.D", "Sheet1.C").expect("edge");

    let order = dag.topological_order().expect("acyclic");
    assert_eq!(order.len(), 4);
    assert!(position(&order, "Sheet1.A") < position(&order, "Sheet1.C"));
    assert!(position(&order, "Sheet1.B") < position(&order, "Sheet1.C"));
    assert!(position(&order, "Sheet1.C") < position(&order, "Sheet1.D"));
}

#[test]
fn cross_sheet_chain_orders_across_sheets() {
    let mut dag = Dag::new();
    add_input(&mut dag, "Prices.A");
    add_formula(&mut dag, "Orders.C", "=Prices!A1*B1", &["Prices.A"]);
    add_formula(&mut dag, "Summary.A", "=SUM(Orders!C1:C10)", &["Orders.C"]);

    let order = dag.topological_order().expect("acyclic");
    assert_eq!(order, vec!["Prices.A", "Orders.C", "Summary.A"]);
    assert_eq!(
        dag.dependents_of("Prices.A").expect("known"),
        vec!["Orders.C", "Summary.A"]
    );
}

#[test]
fn three_node_cycle_is_reported_in_path_order() {
    let mut dag = Dag::new();
    add_formula(&mut dag, "S.A", "=B1", &[]);
    add_formula(&mut dag, "S.B", "=C1", &[]);
    add_formula(&mut dag, "S.C", "=A1", &[]);
    dag.add_dependency("S.A", "S.B").expect("edge");
    dag.add_dependency("S.B", "S.C").expect("edge");
    dag.add_dependency("S.C", "S.A").expect("edge");

    let cycles = dag.find_cycles();
    assert_eq!(cycles.len(), 1);
    assert_eq!(cycles[0], vec!["S.A", "S.B", "S.C", "S.A"]);

    let err = dag.topological_order().expect_err("cycle");
    assert!(matches!(err, DagError::CircularDependency { ref cycle } if cycle.len() == 4));
}

#[test]
fn acyclic_graph_has_no_cycles() {
    let mut dag = Dag::new();
    add_input(&mut dag, "S.A");
    add_formula(&mut dag, "S.B", "=A1", &["S.A"]);
    add_formula(&mut dag, "S.C", "=A1+B1", &["S.A", "S.B"]);
    assert!(dag.find_cycles().is_empty());
}

#[test]
fn node_info_serializes_neighbours() {
    let mut dag = Dag::new();
    add_input(&mut dag, "S.A");
    add_formula(&mut dag, "S.B", "=A1*2", &["S.A"]);

    let info = dag.node_info("S.B").expect("known");
    let json = serde_json::to_value(&info).expect("serialize");
    assert_eq!(json["id"], "S.B");
    assert_eq!(json["is_formula"], true);
    assert_eq!(json["formula"], "=A1*2");
    assert_eq!(json["dependencies"][0], "S.A");

    let input = serde_json::to_value(dag.node_info("S.A").expect("known")).expect("serialize");
    assert!(input.get("formula").is_none());
    assert_eq!(input["dependents"][0], "S.B");
}

#[test]
fn empty_graph_orders_to_nothing() {
    let dag = Dag::new();
    assert!(dag.is_empty());
    assert!(dag.topological_order().expect("empty").is_empty());
}
