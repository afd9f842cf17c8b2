use recalc_formulas::{
    FormulaCategory, FormulaError, FormulaExpr, FormulaTranslator, Function, SheetCatalog,
    SheetScope,
};

fn catalog() -> SheetCatalog {
    let mut catalog = SheetCatalog::new();
    catalog.insert(
        "Sheet1",
        vec!["A".into(), "B".into(), "C".into(), "X".into()],
    );
    catalog.insert("Sheet2", vec!["A".into(), "B".into()]);
    catalog.insert("Price List", vec!["Sku".into(), "Price".into()]);
    catalog
}

#[test]
fn test_translate_arithmetic() {
    let catalog = catalog();
    let translator = FormulaTranslator::new(&catalog);
    let formula = translator
        .translate("=A1+B1", "Sheet1", "C")
        .expect("translate");

    assert_eq!(formula.category, FormulaCategory::Arithmetic);
    assert_eq!(formula.node_id(), "Sheet1.C");
    assert_eq!(formula.dependency_tokens(), vec!["A1", "B1"]);
    assert_eq!(formula.dependency_ids(), vec!["Sheet1.A", "Sheet1.B"]);
    assert!(formula.is_row_wise());
    assert!(!formula.is_array);
}

#[test]
fn test_translate_aggregate_range_collapses_to_one_column() {
    let catalog = catalog();
    let translator = FormulaTranslator::new(&catalog);
    let formula = translator
        .translate("=SUM(A1:A3)", "Sheet1", "C")
        .expect("translate");

    assert_eq!(formula.category, FormulaCategory::Aggregate);
    assert_eq!(formula.dependency_ids(), vec!["Sheet1.A"]);
    assert!(!formula.is_row_wise());
    assert!(matches!(
        formula.expr,
        FormulaExpr::Call {
            function: Function::Sum,
            ..
        }
    ));
}

#[test]
fn test_translate_cross_sheet() {
    let catalog = catalog();
    let translator = FormulaTranslator::new(&catalog);
    let formula = translator
        .translate("=Sheet2!A1 * 'Price List'!B2", "Sheet1", "X")
        .expect("translate");

    assert_eq!(
        formula.dependency_ids(),
        vec!["Sheet2.A", "Price List.Price"]
    );
    assert!(formula.dependencies.iter().all(|d| d.is_qualified()));
    // Arithmetic, but reads other sheets row by row.
    assert_eq!(formula.category, FormulaCategory::Arithmetic);
    assert!(!formula.is_row_wise());
    match &formula.expr {
        FormulaExpr::Binary { left, .. } => assert!(matches!(
            left.as_ref(),
            FormulaExpr::Column(column) if column.scope == SheetScope::Named("Sheet2".into())
        )),
        other => panic!("expected binary op, got {other:?}"),
    }
}

#[test]
fn test_translate_nested_if_sum_is_aggregate() {
    let catalog = catalog();
    let translator = FormulaTranslator::new(&catalog);
    let formula = translator
        .translate("=IF(SUM(A1:A3)>10,\"High\",\"Low\")", "Sheet1", "C")
        .expect("translate");
    assert_eq!(formula.category, FormulaCategory::Aggregate);
}

#[test]
fn test_translate_array_formula() {
    let catalog = catalog();
    let translator = FormulaTranslator::new(&catalog);

    let summed = translator
        .translate("{=SUM(IF(A1:A3>1,B1:B3,0))}", "Sheet1", "C")
        .expect("translate");
    assert!(summed.is_array);
    assert_eq!(summed.category, FormulaCategory::Aggregate);

    let plain = translator
        .translate("{=A1:B3*2}", "Sheet1", "C")
        .expect("translate");
    assert!(plain.is_array);
    assert_eq!(plain.category, FormulaCategory::Arithmetic);
    assert!(plain.sums_rows());
    assert!(!plain.is_row_wise());
    assert_eq!(plain.dependency_ids(), vec!["Sheet1.A", "Sheet1.B"]);
}

#[test]
fn test_translate_rejects_missing_equals() {
    let catalog = catalog();
    let translator = FormulaTranslator::new(&catalog);
    let err = translator
        .translate("A1+B1", "Sheet1", "C")
        .expect_err("missing '='");
    assert!(matches!(err, FormulaError::MalformedFormula { ref formula, .. } if formula == "A1+B1"));
}

#[test]
fn test_translate_rejects_unsupported_function() {
    let catalog = catalog();
    let translator = FormulaTranslator::new(&catalog);
    let err = translator
        .translate("=XLOOKUP(A1,B1:B3,C1:C3)", "Sheet1", "X")
        .expect_err("unsupported");
    match err {
        FormulaError::MalformedFormula { formula, reason } => {
            assert_eq!(formula, "=XLOOKUP(A1,B1:B3,C1:C3)");
            assert!(reason.contains("unsupported function"));
        }
        other => panic!("expected MalformedFormula, got {other:?}"),
    }
}

#[test]
fn test_translate_rejects_unsupported_function_with_digits() {
    let catalog = catalog();
    let translator = FormulaTranslator::new(&catalog);
    for raw in ["=LOG10(A1)", "=ATAN2(A1,A1)", "=DAYS360 (A1, B1)"] {
        let err = translator.translate(raw, "Sheet1", "X").expect_err("unsupported");
        match err {
            FormulaError::MalformedFormula { formula, reason } => {
                assert_eq!(formula, raw);
                assert!(reason.contains("unsupported function"), "{raw}: {reason}");
            }
            other => panic!("expected MalformedFormula for {raw}, got {other:?}"),
        }
    }
}

#[test]
fn test_translate_unknown_sheet_and_column() {
    let catalog = catalog();
    let translator = FormulaTranslator::new(&catalog);

    let err = translator
        .translate("=Missing!A1", "Sheet1", "C")
        .expect_err("unknown sheet");
    assert!(matches!(err, FormulaError::UnknownSheetReference { ref sheet, .. } if sheet == "Missing"));

    let err = translator
        .translate("=Sheet2!C1", "Sheet1", "C")
        .expect_err("unknown column");
    assert!(matches!(
        err,
        FormulaError::UnknownColumnReference { ref sheet, ref column } if sheet == "Sheet2" && column == "C"
    ));
}

#[test]
fn test_translate_header_names() {
    let catalog = catalog();
    let translator = FormulaTranslator::new(&catalog);
    let formula = translator
        .translate("=Price * 2", "Price List", "Sku")
        .expect("translate");
    assert_eq!(formula.dependency_ids(), vec!["Price List.Price"]);
    assert_eq!(formula.dependency_tokens(), vec!["Price"]);
}
