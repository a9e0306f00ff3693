use chrono::NaiveDate;
use indicator_bank_builder::export::workbook_to_bytes;
use indicator_bank_builder::schema::*;
use indicator_bank_builder::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const MONTH_CELLS: [&str; 12] = [
    "B19", "C19", "D19", "E19", "F19", "G19", "H19", "I19", "J19", "K19", "L19", "M19",
];

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 9, 30).unwrap()
}

fn put(root: &Path, rel: &str, bytes: &[u8]) -> anyhow::Result<()> {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, bytes)?;
    Ok(())
}

fn ficha_sheet(code: &str, area: &str, periodicity: &str, months: &[Option<f64>]) -> Sheet {
    let mut sheet = Sheet::new("Ficha Técnica");
    sheet.set_a1("L5", code).unwrap();
    sheet.set_a1("C5", format!("Indicador {}", code)).unwrap();
    sheet.set_a1("C7", area).unwrap();
    sheet.set_a1("C11", periodicity).unwrap();
    for (cell, value) in MONTH_CELLS.iter().zip(months) {
        if let Some(value) = value {
            sheet.set_a1(cell, *value).unwrap();
        }
    }
    sheet
}

fn ficha_bytes(code: &str, area: &str, periodicity: &str, months: &[Option<f64>]) -> Vec<u8> {
    let workbook = Workbook::new().with_sheet(ficha_sheet(code, area, periodicity, months));
    workbook_to_bytes(&workbook).unwrap()
}

/// Bank snapshot written directly with rust_xlsxwriter, as a user-edited
/// file would look.
fn snapshot_bytes(columns: &[String], rows: &[&[(&str, &str)]]) -> anyhow::Result<Vec<u8>> {
    let mut workbook = rust_xlsxwriter::Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name("Banco")?;
    for (c, header) in columns.iter().enumerate() {
        worksheet.write_string(0, c as u16, header)?;
    }
    for (r, row) in rows.iter().enumerate() {
        for (column, value) in row.iter() {
            let c = columns.iter().position(|h| h == column).unwrap();
            worksheet.write_string(r as u32 + 1, c as u16, *value)?;
        }
    }
    Ok(workbook.save_to_buffer()?)
}

fn manual_bytes(rows: &[[&str; 6]]) -> anyhow::Result<Vec<u8>> {
    let mut workbook = rust_xlsxwriter::Workbook::new();
    let worksheet = workbook.add_worksheet();
    let headers = [
        "Cod. Indicador",
        STATUS,
        ORIGIN,
        DOCUMENTED,
        CONTRACT_REVIEWED,
        REVIEWED,
    ];
    for (c, header) in headers.iter().enumerate() {
        worksheet.write_string(0, c as u16, *header)?;
    }
    for (r, row) in rows.iter().enumerate() {
        for (c, value) in row.iter().enumerate() {
            if !value.is_empty() {
                worksheet.write_string(r as u32 + 1, c as u16, *value)?;
            }
        }
    }
    Ok(workbook.save_to_buffer()?)
}

fn bank_folders(root: &Path) -> anyhow::Result<()> {
    fs::create_dir_all(root.join("banco/2025/agosto"))?;
    fs::create_dir_all(root.join("banco/2025/septiembre"))?;
    fs::create_dir_all(root.join("banco/2024/diciembre"))?;
    Ok(())
}

fn quarterly_months() -> Vec<Option<f64>> {
    vec![
        Some(10.0),
        Some(20.0),
        Some(30.0),
        Some(40.0),
        Some(50.0),
        Some(60.0),
        None,
        None,
        None,
        Some(70.0),
        Some(80.0),
        Some(90.0),
    ]
}

#[test]
fn test_local_run_end_to_end() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let root = dir.path();
    bank_folders(root)?;

    let mut gestion = ficha_sheet("ind-ges-3 ", "Gestión", "Trimestral", &quarterly_months());
    gestion.set_a1("C9", "Quejas resueltas")?;
    gestion.set_a1("H9", "Quejas recibidas")?;
    put(
        root,
        "fichas/Gestión/2025/IND-GES-3.xlsx",
        &workbook_to_bytes(&Workbook::new().with_sheet(gestion))?,
    )?;

    let mut evaluation = Sheet::new("Evaluación");
    evaluation.set_a1("A2", "Activo")?;
    evaluation.set_a1("B2", "Interno")?;
    let percent = Workbook::new()
        .with_sheet(ficha_sheet("IND-GES-12", "Gestión", "Mensual", &[Some(0.85); 12]))
        .with_sheet(evaluation);
    put(root, "fichas/Gestión/2025/IND-GES-12.xlsx", &workbook_to_bytes(&percent)?)?;

    put(
        root,
        "fichas/Gestión/2025/sin_codigo.xlsx",
        &ficha_bytes("GES-99", "Gestión", "Mensual", &[Some(1.0); 12]),
    )?;
    put(root, "fichas/Gestión/2025/roto.xlsx", b"not a workbook")?;
    put(root, "fichas/Gestión/2025/leeme.txt", b"notes")?;
    put(
        root,
        "fichas/Calidad/2024/IND-CAL-1.xlsx",
        &ficha_bytes("IND-CAL-1", "Calidad", "Anual", &[Some(5.0)]),
    )?;
    put(
        root,
        "manual/manual.xlsx",
        &manual_bytes(&[
            ["IND-GES-12", "Inactivo", "", "Sí", "", ""],
            ["IND-NOPE-1", "Activo", "Externo", "", "", ""],
        ])?,
    )?;

    let mut config = BankConfig::for_year(2025);
    config.folders.manual_file = Some("manual/manual.xlsx".to_string());
    let store = LocalFolderStore::new(root);

    let report = process_indicator_bank(&store, &store, &config, today())?;

    assert_eq!(report.log.len(), 4);
    let count = |action: &LogAction| report.log.iter().filter(|e| &e.action == action).count();
    assert_eq!(count(&LogAction::Added), 2);
    assert_eq!(count(&LogAction::CodeNotFound), 1);
    let failed = report
        .log
        .iter()
        .find(|e| matches!(e.action, LogAction::Error(_)))
        .unwrap();
    assert_eq!(failed.source, "roto.xlsx");

    let table = &report.table;
    assert_eq!(table.len(), 2);
    assert_eq!(table.code_at(0), Some("IND-GES-3"));
    assert_eq!(table.code_at(1), Some("IND-GES-12"));
    assert!(!table.contains_code("IND-NOPE-1"));

    assert_eq!(
        table.get("IND-GES-3", ANNUAL_VALUE),
        Some(&FieldValue::Number(50.0))
    );
    assert_eq!(
        table.get("IND-GES-3", FORMULA),
        Some(&FieldValue::text("Quejas resueltas / Quejas recibidas"))
    );
    assert_eq!(
        table.get("IND-GES-3", &config.month_columns[6]),
        Some(&FieldValue::text("N/A"))
    );

    assert_eq!(
        table.get("IND-GES-12", ANNUAL_VALUE),
        Some(&FieldValue::text("85.00%"))
    );
    assert_eq!(
        table.get("IND-GES-12", &config.month_columns[0]),
        Some(&FieldValue::text("85.00%"))
    );
    assert_eq!(table.get("IND-GES-12", STATUS), Some(&FieldValue::text("Inactivo")));
    assert_eq!(table.get("IND-GES-12", ORIGIN), Some(&FieldValue::text("Interno")));
    assert_eq!(table.get("IND-GES-12", DOCUMENTED), Some(&FieldValue::text("Sí")));

    assert_eq!(report.summaries.by_area.count("Gestión", "COUNT"), Some(2));
    assert_eq!(
        report.summaries.by_periodicity.count("Gestión", "TRIMESTRAL"),
        Some(1)
    );

    let month = root.join("banco/2025/septiembre");
    assert!(month.join("Banco_Indicadores_BASE.xlsx").exists());
    assert!(month.join("Banco_Indicadores_2025-09-30.xlsx").exists());
    assert!(root.join("reportes/Reporte_Indicadores.xlsx").exists());

    let csv = fs::read_to_string(root.join("reportes/Reporte_Indicadores.csv"))?;
    assert!(csv.starts_with("source,sheet,code,action,ok"));
    assert!(csv.contains("code_not_found"));
    assert!(csv.contains("roto.xlsx,,,"));
    assert!(csv.contains("error:"));

    let reloaded = MasterTable::from_workbook(
        &store.read_workbook("banco/2025/septiembre/Banco_Indicadores_BASE.xlsx")?,
        &config.columns,
    )?;
    assert_eq!(reloaded.len(), 2);
    assert_eq!(
        reloaded.get("IND-GES-12", STATUS),
        Some(&FieldValue::text("Inactivo"))
    );
    Ok(())
}

#[test]
fn test_existing_snapshot_is_updated_not_duplicated() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let root = dir.path();
    bank_folders(root)?;

    let config = BankConfig::for_year(2025);
    put(
        root,
        "banco/2025/septiembre/Banco_Indicadores_BASE.xlsx",
        &snapshot_bytes(
            &config.columns,
            &[
                &[(CODE, "IND-GES-3"), (AREA, "Gestión"), (STATUS, "Activo"), (DOCUMENTED, "=B2")],
                &[(CODE, "IND-CAL-7"), (AREA, "Calidad")],
            ],
        )?,
    )?;
    put(
        root,
        "fichas/Gestión/2025/IND-GES-3.xlsx",
        &ficha_bytes("IND-GES-3", "Gestión", "Trimestral", &quarterly_months()),
    )?;

    let store = LocalFolderStore::new(root);
    let report = IndicatorBankProcessor::run(&store, &store, &config, today())?;

    assert_eq!(report.log.len(), 1);
    assert_eq!(report.log[0].action, LogAction::Updated);

    let table = &report.table;
    assert_eq!(table.len(), 2);
    assert_eq!(table.code_at(0), Some("IND-CAL-7"));
    assert_eq!(table.code_at(1), Some("IND-GES-3"));
    assert_eq!(table.get("IND-GES-3", STATUS), Some(&FieldValue::text("Activo")));
    assert_eq!(table.get("IND-GES-3", DOCUMENTED), None);
    assert_eq!(
        table.get("IND-GES-3", ANNUAL_VALUE),
        Some(&FieldValue::Number(50.0))
    );

    let written: Vec<_> = fs::read_dir(root.join("banco/2025/septiembre"))?.collect();
    assert_eq!(written.len(), 2);
    Ok(())
}

#[test]
fn test_snapshot_falls_back_to_bank_root() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let root = dir.path();
    bank_folders(root)?;

    let config = BankConfig::for_year(2025);
    put(
        root,
        "banco/Banco_Indicadores_BASE.xlsx",
        &snapshot_bytes(&config.columns, &[&[(CODE, "ind-cal-7"), (AREA, "Calidad")]])?,
    )?;
    fs::create_dir_all(root.join("fichas"))?;

    let store = LocalFolderStore::new(root);
    let report = process_indicator_bank(&store, &store, &config, today())?;

    assert!(report.log.is_empty());
    assert!(report.table.contains_code("IND-CAL-7"));
    assert!(root
        .join("banco/2025/septiembre/Banco_Indicadores_BASE.xlsx")
        .exists());
    Ok(())
}

#[test]
fn test_manual_file_without_override_columns_fails() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let root = dir.path();
    bank_folders(root)?;
    fs::create_dir_all(root.join("fichas"))?;

    let mut sheet = Sheet::new("Manual");
    sheet.set_a1("A1", "Cod. Indicador")?;
    put(root, "manual.xlsx", &workbook_to_bytes(&Workbook::new().with_sheet(sheet))?)?;

    let mut config = BankConfig::for_year(2025);
    config.folders.manual_file = Some("manual.xlsx".to_string());
    let store = LocalFolderStore::new(root);

    let result = process_indicator_bank(&store, &store, &config, today());
    assert!(matches!(result, Err(IndicatorBankError::MissingColumn(_))));
    Ok(())
}

#[test]
fn test_memory_store_run_matches_local_semantics() {
    let mut store = MemoryStore::new();
    store.add_folder("banco", "2025");
    store.add_folder("banco/2025", "septiembre");
    store.add_file(
        "fichas/Gestión/2025",
        "IND-GES-3.xlsx",
        ficha_bytes("IND-GES-3", "Gestión", "Trimestral", &quarterly_months()),
    );
    store.add_file(
        "fichas/Gestión/2025",
        "IND-GES-4.xlsx",
        ficha_bytes("IND-GES-4", "Gestión", "Mensual", &[Some(80.0), None, None, Some(60.0)]),
    );

    let config = BankConfig::for_year(2025);
    let report = process_indicator_bank(&store, &store, &config, today()).unwrap();

    assert_eq!(
        report.table.get("IND-GES-3", ANNUAL_VALUE),
        Some(&FieldValue::Number(50.0))
    );
    assert_eq!(
        report.table.get("IND-GES-4", ANNUAL_VALUE),
        Some(&FieldValue::Number(60.0))
    );
    assert_eq!(store.file_names("reportes").len(), 2);
}

#[test]
fn test_schema_generation() {
    let schema_json = BankConfig::schema_as_json().unwrap();

    assert!(schema_json.contains("code_prefix"));
    assert!(schema_json.contains("month_cells"));
    assert!(schema_json.contains("fichas_root"));
    assert!(schema_json.contains("sheet_marker"));

    let config = BankConfig::from_json(&BankConfig::for_year(2025).to_json().unwrap()).unwrap();
    assert_eq!(config, BankConfig::for_year(2025));
}
