use media_spend_normalizer::*;
use rust_xlsxwriter::Workbook;
use std::fs::File;
use std::io::Write;

const MONITOR_EXPORT: &str = "\
REPORTE DE INVERSION PUBLICITARIA
PERIODO: 01/03/2023 - 31/03/2023
MEDIOS: TV, RADIO, DIARIOS
MONEDA: SOLES
#|MEDIO|DIA|MARCA|ANUNCIANTE|SECTOR|CATEGORIA|DURACION|INVERSION|REGION/ÁMBITO
1|TV|09/03/2023|COLA|ACME|BEBIDAS|GASEOSAS|30|1000|LIMA
2|RADIO|02/03/2023|AGUA|ACME|BEBIDAS|AGUAS|20|2000|LIMA
3|DIARIOS|15/03/2023|BANCO SUR|SUR SA|FINANZAS|BANCOS||400|NACIONAL
";

const OUTVIEW_HEADER: [&str; 12] = [
    "Fecha",
    "NombreBase",
    "Proveedor",
    "Tipo Elemento",
    "Distrito",
    "Avenida",
    "Nro Calle/Cuadra",
    "Orientación de Vía",
    "Marca",
    "Versión",
    "Tarifa S/.",
    "Latitud",
];

struct Sighting {
    date: &'static str,
    base_name: &'static str,
    element_type: &'static str,
    avenue: &'static str,
    brand: &'static str,
    tariff: f64,
}

const SIGHTINGS: [Sighting; 3] = [
    Sighting {
        date: "09/03/2023",
        base_name: "OPW09MAR2023",
        element_type: "PANTALLA LED",
        avenue: "AV. JAVIER PRADO",
        brand: "COLA",
        tariff: 900.0,
    },
    Sighting {
        date: "01/03/2023",
        base_name: "OPW01MAR2023",
        element_type: "VALLA",
        avenue: "AV. LARCO",
        brand: "ZETA",
        tariff: 1500.0,
    },
    Sighting {
        date: "02/03/2023",
        base_name: "OPW01MAR2023",
        element_type: "VALLA",
        avenue: "AV. LARCO",
        brand: "ZETA",
        tariff: 1500.0,
    },
];

fn outview_workbook() -> anyhow::Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();

    for (col, header) in OUTVIEW_HEADER.iter().enumerate() {
        worksheet.write_string(0, col as u16, *header)?;
    }
    for (idx, s) in SIGHTINGS.iter().enumerate() {
        let row = idx as u32 + 1;
        worksheet.write_string(row, 0, s.date)?;
        worksheet.write_string(row, 1, s.base_name)?;
        worksheet.write_string(row, 2, "CLEAR CHANNEL")?;
        worksheet.write_string(row, 3, s.element_type)?;
        worksheet.write_string(row, 4, "MIRAFLORES")?;
        worksheet.write_string(row, 5, s.avenue)?;
        worksheet.write_string(row, 6, "12")?;
        worksheet.write_string(row, 7, "N-S")?;
        worksheet.write_string(row, 8, s.brand)?;
        worksheet.write_string(row, 9, "V1")?;
        worksheet.write_number(row, 10, s.tariff)?;
        worksheet.write_number(row, 11, -12.1211)?;
    }

    Ok(workbook.save_to_buffer()?)
}

fn outview_semicolon_export() -> String {
    let mut text = "Fecha;NombreBase;Proveedor;Tipo Elemento;Avenida;Marca;Tarifa S/.\n".to_string();
    for s in &SIGHTINGS {
        let tariff = if s.tariff == 1500.0 { "1.500,00" } else { "900" };
        text.push_str(&format!(
            "{};{};CLEAR CHANNEL;{};{};{};{}\n",
            s.date, s.base_name, s.element_type, s.avenue, s.brand, tariff
        ));
    }
    text
}

fn investment_of(dataset: &ConsolidatedDataset, brand: &str) -> Vec<f64> {
    dataset
        .records
        .iter()
        .filter(|r| r.brand == brand)
        .map(|r| r.investment)
        .collect()
}

#[test]
fn test_full_batch_with_workbook() {
    let workbook = outview_workbook().unwrap();
    let inputs = SourceInputs::new()
        .with_monitor(MONITOR_EXPORT.as_bytes())
        .with_outview(&workbook);

    let outcome = process_media_spend(&inputs, &EngineConfig::default()).unwrap();
    let dataset = &outcome.consolidated;

    assert_eq!(dataset.len(), 6);
    assert_eq!(dataset.columns.len(), 27);
    assert!(outcome.report.is_empty(), "{:?}", outcome.report);

    assert_eq!(investment_of(dataset, "AGUA"), vec![850.0]);
    assert_eq!(investment_of(dataset, "BANCO SUR"), vec![59.5]);
    assert_eq!(investment_of(dataset, "ZETA"), vec![320.0, 320.0]);

    // same (date, brand): the Monitor insertion stays ahead of the OutView sighting
    assert_eq!(investment_of(dataset, "COLA"), vec![255.0, 120.0]);
    let cola_sources: Vec<SourceKind> = dataset
        .records
        .iter()
        .filter(|r| r.brand == "COLA")
        .map(|r| r.source)
        .collect();
    assert_eq!(cola_sources, vec![SourceKind::Monitor, SourceKind::OutView]);

    assert!((dataset.total_investment() - 1924.5).abs() < 1e-6);

    let dates: Vec<String> = dataset
        .records
        .iter()
        .map(|r| r.date.format("%d/%m").to_string())
        .collect();
    assert_eq!(dates, vec!["01/03", "02/03", "02/03", "09/03", "09/03", "15/03"]);

    let outview = outcome.outview.as_ref().unwrap();
    let valla = &outview.sightings[1];
    assert_eq!(valla.month_token, "MAR2023");
    assert_eq!(valla.derivation.denominator_monthly, 2);
    assert_eq!(valla.derivation.cap, Some(800.0));
    assert!((valla.derivation.tariff_monthly - 1000.0).abs() < 1e-9);
    assert_eq!(
        outview.sightings.iter().map(|s| s.monthly_count).collect::<Vec<_>>(),
        vec![1, 1, 0]
    );
    assert_eq!(outview.sightings[0].record.latitude, Some(-12.1211));

    let monitor = outcome.monitor.as_ref().unwrap();
    assert_eq!(monitor.metadata_lines[1], "PERIODO: 01/03/2023 - 31/03/2023");
    assert_eq!(monitor.summary.sectors, vec!["BEBIDAS", "FINANZAS"]);

    let csv = export::to_csv_string(dataset).unwrap();
    let mut file = File::create(std::env::temp_dir().join("test_full_batch.csv")).unwrap();
    file.write_all(csv.as_bytes()).unwrap();
    assert_eq!(csv.lines().count(), 7);

    println!("✓ Full batch test passed - {} rows consolidated", dataset.len());
}

#[test]
fn test_workbook_and_text_exports_agree() {
    let workbook = outview_workbook().unwrap();
    let text = outview_semicolon_export();
    let config = EngineConfig::default();

    let from_workbook =
        process_media_spend(&SourceInputs::new().with_outview(&workbook), &config).unwrap();
    let from_text =
        process_media_spend(&SourceInputs::new().with_outview(text.as_bytes()), &config).unwrap();

    let investments = |outcome: &ProcessingOutcome| -> Vec<f64> {
        outcome
            .consolidated
            .records
            .iter()
            .map(|r| r.investment)
            .collect()
    };
    assert_eq!(investments(&from_workbook), investments(&from_text));
    assert_eq!(investments(&from_text), vec![320.0, 320.0, 120.0]);

    let summary = &from_text.outview.as_ref().unwrap().summary;
    assert_eq!(summary.element_types, vec!["PANTALLA LED", "VALLA"]);
    assert_eq!(summary.providers, vec!["CLEAR CHANNEL"]);
    assert!((summary.total_investment - 760.0).abs() < 1e-9);
}

#[test]
fn test_config_overrides_change_results() {
    let overrides = ConfigOverrides::from_json_str(
        r#"{
            "modifications": [
                { "action": "set_medium_factor", "medium": "TV", "factor": 0.5 },
                { "action": "set_exchange_rate", "rate": 3.75 },
                { "action": "remove_cap", "element_type": "VALLA" }
            ]
        }"#,
    )
    .unwrap();
    let config = overrides.apply(&EngineConfig::default());

    let workbook = outview_workbook().unwrap();
    let inputs = SourceInputs::new()
        .with_monitor(MONITOR_EXPORT.as_bytes())
        .with_outview(&workbook);
    let outcome = process_media_spend(&inputs, &config).unwrap();

    let tv = &outcome.monitor.as_ref().unwrap().insertions[0];
    assert_eq!(tv.record.medium, Medium::Tv);
    assert_eq!(tv.factor, 0.5);
    assert_eq!(tv.record.spend, 500.0);

    // 1500 / 3.75 = 400 per day, 800 per month uncapped, 2 sightings
    assert_eq!(
        investment_of(&outcome.consolidated, "ZETA"),
        vec![320.0, 320.0]
    );
    assert!(outcome.report.iter().any(|w| matches!(
        w,
        DataQualityWarning::UncappedElementType { rows: 2, .. }
    )));
}

#[test]
fn test_config_file_round_trip() {
    let path = std::env::temp_dir().join("media_spend_config_round_trip.json");
    let config = EngineConfig {
        monitor: MonitorFactors::default().with_factor(Medium::parse("CINE"), 0.3),
        ..EngineConfig::default()
    };

    config.save_to_path(&path).unwrap();
    let loaded = EngineConfig::from_path(&path).unwrap();
    assert_eq!(loaded, config);
    assert_eq!(loaded.monitor.factor(&Medium::parse("cine")), Some(0.3));

    std::fs::remove_file(&path).ok();
}

#[test]
fn test_schema_generation() {
    let schema_json = EngineConfig::schema_as_json().unwrap();

    let mut file = File::create(std::env::temp_dir().join("media_spend_schema.json")).unwrap();
    file.write_all(schema_json.as_bytes()).unwrap();

    assert!(schema_json.contains("exchange_rate"));
    assert!(schema_json.contains("led_factor"));
    assert!(schema_json.contains("caps"));

    println!("✓ Schema generation test passed");
}

#[test]
fn test_row_problems_are_reported_not_fatal() {
    let monitor = "\
REPORTE
PERIODO
MEDIOS
MONEDA
#|MEDIO|DIA|MARCA|ANUNCIANTE|INVERSION
1|TV|09/03/2023|COLA|ACME|1000
2|TV|31/02/2023|COLA|ACME|500
3|CINE|10/03/2023|COLA|ACME|100
4|TV|11/03/2023|COLA
";
    let outcome = process_media_spend(
        &SourceInputs::new().with_monitor(monitor.as_bytes()),
        &EngineConfig::default(),
    )
    .unwrap();

    assert_eq!(outcome.consolidated.len(), 2);
    let warnings: Vec<&DataQualityWarning> = outcome.report.iter().collect();
    assert!(warnings
        .iter()
        .any(|w| matches!(w, DataQualityWarning::SkippedLine { found: 4, expected: 6, .. })));
    assert!(warnings
        .iter()
        .any(|w| matches!(w, DataQualityWarning::MalformedDate { .. })));
    assert!(warnings.iter().any(|w| matches!(
        w,
        DataQualityWarning::UnknownMedium { medium, rows: 1 } if medium == "CINE"
    )));
    assert!(outcome.report.findings().any(|f| matches!(
        f,
        ValidationFinding::UnexpectedMedia { media } if media == &vec!["CINE".to_string()]
    )));
    assert_eq!(investment_of(&outcome.consolidated, "COLA"), vec![255.0, 100.0]);
}

#[test]
fn test_missing_sources() {
    let result = process_media_spend(&SourceInputs::new(), &EngineConfig::default());
    assert!(matches!(result, Err(MediaSpendError::MissingSources)));
}

#[test]
fn test_outview_missing_required_columns() {
    let text = "Fecha;Marca\n09/03/2023;COLA\n";
    let result = process_media_spend(
        &SourceInputs::new().with_outview(text.as_bytes()),
        &EngineConfig::default(),
    );

    match result {
        Err(MediaSpendError::Format {
            source_kind,
            error: FormatError::MissingColumns(missing),
        }) => {
            assert_eq!(source_kind, "OutView");
            assert!(missing.iter().any(|c| c == "NOMBREBASE"));
            assert!(missing.iter().any(|c| c == "TARIFA S/."));
        }
        _ => panic!("expected missing OutView columns"),
    }
}
