//! Readers for the two source payloads.
//!
//! Both readers turn raw bytes into typed rows with normalized column names.
//! Structural problems (undecodable payload, missing header, missing required
//! columns) abort with a [`FormatError`]; problems confined to a single row are
//! recorded in the [`QualityReport`] and the batch continues.

use crate::error::{FormatError, MediaSpendError, Result};
use crate::report::{DataQualityWarning, QualityReport};
use crate::schema::{ElementType, Medium, RawMonitorRecord, RawOutViewRecord, SourceKind};
use crate::utils::{
    excel_serial_to_date, normalize_label, parse_day_first_date, parse_localized_number,
    parse_spend,
};
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use chrono::NaiveDate;
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::Cursor;

pub const MONITOR_HEADER_SENTINEL: &str = "|MEDIO|";
pub const MONITOR_HEADER_SEARCH_LINES: usize = 80;
/// Four metadata lines, the header and at least one data line.
pub const MONITOR_MIN_LINES: usize = 6;
pub const MONITOR_METADATA_LINES: usize = 4;

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const OLE_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0];

/// Decodes a text payload: UTF-8 (BOM stripped), falling back to Windows-1252.
pub fn decode_text(bytes: &[u8]) -> std::result::Result<String, FormatError> {
    if bytes.contains(&0) {
        return Err(FormatError::Undecodable(
            "payload contains NUL bytes".to_string(),
        ));
    }

    match std::str::from_utf8(bytes) {
        Ok(text) => Ok(text.strip_prefix('\u{feff}').unwrap_or(text).to_string()),
        Err(_) => {
            // Windows-1252 is what Latin-American Excel/TXT exports use
            let (decoded, _, had_errors) = encoding_rs::WINDOWS_1252.decode(bytes);
            if had_errors {
                return Err(FormatError::Undecodable(
                    "neither UTF-8 nor Windows-1252".to_string(),
                ));
            }
            Ok(decoded.into_owned())
        }
    }
}

/// Position of each normalized column name; the first occurrence wins.
struct ColumnIndex {
    positions: HashMap<String, usize>,
}

impl ColumnIndex {
    fn new(columns: &[String]) -> Self {
        let mut positions = HashMap::with_capacity(columns.len());
        for (idx, name) in columns.iter().enumerate() {
            positions.entry(name.clone()).or_insert(idx);
        }
        Self { positions }
    }

    fn find(&self, aliases: &[&str]) -> Option<usize> {
        aliases
            .iter()
            .find_map(|alias| self.positions.get(*alias).copied())
    }

    fn require(&self, aliases: &[&str], missing: &mut Vec<String>) -> usize {
        match self.find(aliases) {
            Some(idx) => idx,
            None => {
                missing.push(aliases[0].to_string());
                0
            }
        }
    }
}

fn extra_columns(
    columns: &[String],
    consumed: &HashSet<usize>,
    value_at: impl Fn(usize) -> Option<String>,
) -> BTreeMap<String, String> {
    columns
        .iter()
        .enumerate()
        .filter(|(idx, name)| !consumed.contains(idx) && !name.is_empty())
        .filter_map(|(idx, name)| {
            value_at(idx)
                .filter(|v| !v.is_empty())
                .map(|v| (name.clone(), v))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Monitor
// ---------------------------------------------------------------------------

/// A parsed Monitor file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedMonitor {
    /// The metadata lines preceding the header, verbatim
    pub metadata_lines: Vec<String>,
    /// Normalized header names, id column excluded
    pub columns: Vec<String>,
    pub records: Vec<RawMonitorRecord>,
    /// Data lines after the header, including skipped and dropped ones
    pub data_lines: usize,
    /// Lines skipped for a wrong field count
    pub skipped_lines: usize,
    /// Rows dropped for an empty or malformed date
    pub invalid_dates: usize,
    /// Rows dropped for an empty medium
    pub missing_media: usize,
}

impl ParsedMonitor {
    pub fn dropped_rows(&self) -> usize {
        self.skipped_lines + self.invalid_dates + self.missing_media
    }
}

struct MonitorLayout {
    date: usize,
    medium: usize,
    spend: usize,
    brand: Option<usize>,
    product: Option<usize>,
    version: Option<usize>,
    duration: Option<usize>,
    hour: Option<usize>,
    station: Option<usize>,
    program: Option<usize>,
    break_slot: Option<usize>,
    spot_position: Option<usize>,
    sector: Option<usize>,
    category: Option<usize>,
    item: Option<usize>,
    genre: Option<usize>,
    agency: Option<usize>,
    advertiser: Option<usize>,
    editor: Option<usize>,
    region: Option<usize>,
    width: Option<usize>,
    height: Option<usize>,
}

impl MonitorLayout {
    fn resolve(index: &ColumnIndex) -> std::result::Result<Self, FormatError> {
        let mut missing = Vec::new();
        let date = index.require(&["DIA"], &mut missing);
        let medium = index.require(&["MEDIO"], &mut missing);
        let spend = index.require(&["INVERSION", "INVERSIÓN"], &mut missing);
        if !missing.is_empty() {
            return Err(FormatError::MissingColumns(missing));
        }

        Ok(Self {
            date,
            medium,
            spend,
            brand: index.find(&["MARCA"]),
            product: index.find(&["PRODUCTO"]),
            version: index.find(&["VERSION", "VERSIÓN"]),
            duration: index.find(&["DURACION", "DURACIÓN"]),
            hour: index.find(&["HORA"]),
            station: index.find(&["EMISORA/SITE", "EMISORA"]),
            program: index.find(&["PROGRAMA/TIPO DE SITE", "PROGRAMA"]),
            break_slot: index.find(&["BREAK"]),
            spot_position: index.find(&["POS. SPOT"]),
            sector: index.find(&["SECTOR"]),
            category: index.find(&["CATEGORIA", "CATEGORÍA"]),
            item: index.find(&["ITEM", "ÍTEM"]),
            genre: index.find(&["GENERO", "GÉNERO"]),
            agency: index.find(&["AGENCIA"]),
            advertiser: index.find(&["ANUNCIANTE"]),
            editor: index.find(&["EDITORA"]),
            region: index.find(&["REGION/ÁMBITO", "REGION/AMBITO", "REGION", "REGIÓN"]),
            width: index.find(&["ANCHO"]),
            height: index.find(&["ALTO"]),
        })
    }

    fn consumed(&self) -> HashSet<usize> {
        [self.date, self.medium, self.spend]
            .into_iter()
            .chain(
                [
                    self.brand,
                    self.product,
                    self.version,
                    self.duration,
                    self.hour,
                    self.station,
                    self.program,
                    self.break_slot,
                    self.spot_position,
                    self.sector,
                    self.category,
                    self.item,
                    self.genre,
                    self.agency,
                    self.advertiser,
                    self.editor,
                    self.region,
                    self.width,
                    self.height,
                ]
                .into_iter()
                .flatten(),
            )
            .collect()
    }
}

fn field<'r>(fields: &[&'r str], idx: Option<usize>) -> &'r str {
    idx.and_then(|i| fields.get(i)).copied().unwrap_or("")
}

/// Parses a pipe-delimited Monitor export.
/// The header carries `|MEDIO|`, or opens with `MEDIO|` when the export has
/// no id column.
fn is_monitor_header(line: &str) -> bool {
    let upper = line.to_uppercase();
    upper.contains(MONITOR_HEADER_SENTINEL) || upper.starts_with(&MONITOR_HEADER_SENTINEL[1..])
}

pub fn parse_monitor(bytes: &[u8], report: &mut QualityReport) -> Result<ParsedMonitor> {
    read_monitor(bytes, report)
        .map_err(|e| MediaSpendError::format(SourceKind::Monitor.to_string(), e))
}

fn read_monitor(
    bytes: &[u8],
    report: &mut QualityReport,
) -> std::result::Result<ParsedMonitor, FormatError> {
    let text = decode_text(bytes)?;
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    if lines.len() < MONITOR_MIN_LINES {
        return Err(FormatError::TooFewLines {
            found: lines.len(),
            minimum: MONITOR_MIN_LINES,
        });
    }

    let header_idx = lines
        .iter()
        .take(MONITOR_HEADER_SEARCH_LINES)
        .position(|line| is_monitor_header(line))
        .ok_or_else(|| FormatError::MissingHeaderSentinel {
            sentinel: MONITOR_HEADER_SENTINEL.to_string(),
            searched: MONITOR_HEADER_SEARCH_LINES,
        })?;
    if header_idx + 1 == lines.len() {
        return Err(FormatError::NoDataRows);
    }
    info!("Monitor header found on line {}", header_idx + 1);

    let metadata_lines: Vec<String> = lines
        .iter()
        .take(MONITOR_METADATA_LINES.min(header_idx))
        .map(|line| line.to_string())
        .collect();

    let body = lines[header_idx..].join("\n");
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'|')
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes());
    let mut rows = reader.records();

    let header = match rows.next() {
        Some(Ok(header)) => header,
        Some(Err(e)) => return Err(FormatError::Undecodable(e.to_string())),
        None => return Err(FormatError::NoDataRows),
    };
    let expected = header.len();

    let mut columns: Vec<String> = header.iter().map(normalize_label).collect();
    let has_id_column = matches!(columns.first().map(String::as_str), Some("#") | Some(""));
    if has_id_column {
        columns.remove(0);
    }
    let offset = usize::from(has_id_column);

    let index = ColumnIndex::new(&columns);
    let layout = MonitorLayout::resolve(&index)?;
    let consumed = layout.consumed();
    debug!("Monitor columns: {}", columns.join(", "));

    let mut parsed = ParsedMonitor {
        metadata_lines,
        columns: Vec::new(),
        records: Vec::new(),
        data_lines: 0,
        skipped_lines: 0,
        invalid_dates: 0,
        missing_media: 0,
    };

    for (i, result) in rows.enumerate() {
        // header is on line header_idx + 1
        let line = header_idx + i + 2;
        let record = result.map_err(|e| FormatError::Undecodable(e.to_string()))?;
        parsed.data_lines += 1;

        if record.len() != expected {
            warn!(
                "Monitor line {} has {} fields, expected {}; skipping",
                line,
                record.len(),
                expected
            );
            report.push(DataQualityWarning::SkippedLine {
                line,
                found: record.len(),
                expected,
            });
            parsed.skipped_lines += 1;
            continue;
        }

        let fields: Vec<&str> = record.iter().skip(offset).collect();
        let built = build_monitor_record(
            line,
            &fields,
            &layout,
            &columns,
            &consumed,
            &mut parsed,
            report,
        );
        if let Some(row) = built {
            parsed.records.push(row);
        }
    }

    if parsed.invalid_dates > 0 {
        warn!(
            "{} Monitor rows dropped for an invalid date",
            parsed.invalid_dates
        );
    }
    info!(
        "Parsed {} Monitor rows from {} data lines ({} skipped, {} dropped)",
        parsed.records.len(),
        parsed.data_lines,
        parsed.skipped_lines,
        parsed.invalid_dates + parsed.missing_media
    );

    parsed.columns = columns;
    Ok(parsed)
}

fn build_monitor_record(
    line: usize,
    fields: &[&str],
    layout: &MonitorLayout,
    columns: &[String],
    consumed: &HashSet<usize>,
    parsed: &mut ParsedMonitor,
    report: &mut QualityReport,
) -> Option<RawMonitorRecord> {
    let raw_date = field(fields, Some(layout.date));
    let Some(date) = parse_day_first_date(raw_date) else {
        parsed.invalid_dates += 1;
        report.push(DataQualityWarning::MalformedDate {
            source: SourceKind::Monitor,
            row: line,
            value: raw_date.to_string(),
        });
        return None;
    };

    let raw_medium = field(fields, Some(layout.medium));
    if raw_medium.is_empty() {
        warn!("Monitor line {} has no medium; dropping", line);
        parsed.missing_media += 1;
        report.push(DataQualityWarning::MissingMedium { row: line });
        return None;
    }

    let raw_spend = field(fields, Some(layout.spend));
    let spend = match parse_spend(raw_spend) {
        Some(value) if value < 0.0 => {
            report.push(DataQualityWarning::NegativeAmount {
                source: SourceKind::Monitor,
                row: line,
                column: "INVERSION".to_string(),
                value,
            });
            0.0
        }
        Some(value) => value,
        None => {
            report.push(DataQualityWarning::MalformedNumber {
                source: SourceKind::Monitor,
                row: line,
                column: "INVERSION".to_string(),
                value: raw_spend.to_string(),
            });
            0.0
        }
    };

    let mut dimension = |idx: Option<usize>, column: &str| -> Option<f64> {
        let raw = field(fields, idx);
        if raw.is_empty() {
            return None;
        }
        // same convention as INVERSION: ',' groups thousands
        let value = parse_spend(raw);
        if value.is_none() {
            report.push(DataQualityWarning::MalformedNumber {
                source: SourceKind::Monitor,
                row: line,
                column: column.to_string(),
                value: raw.to_string(),
            });
        }
        value
    };
    let width = dimension(layout.width, "ANCHO");
    let height = dimension(layout.height, "ALTO");

    let text = |idx: Option<usize>| field(fields, idx).to_string();

    Some(RawMonitorRecord {
        line,
        date,
        medium: Medium::parse(raw_medium),
        brand: text(layout.brand),
        product: text(layout.product),
        version: text(layout.version),
        duration: text(layout.duration),
        hour: text(layout.hour),
        station: text(layout.station),
        program: text(layout.program),
        break_slot: text(layout.break_slot),
        spot_position: text(layout.spot_position),
        sector: text(layout.sector),
        category: text(layout.category),
        item: text(layout.item),
        genre: text(layout.genre),
        agency: text(layout.agency),
        advertiser: text(layout.advertiser),
        editor: text(layout.editor),
        region: text(layout.region),
        width,
        height,
        spend,
        extra: extra_columns(columns, consumed, |idx| {
            fields.get(idx).map(|v| v.to_string())
        }),
    })
}

// ---------------------------------------------------------------------------
// OutView
// ---------------------------------------------------------------------------

/// A parsed OutView sheet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedOutView {
    pub columns: Vec<String>,
    pub records: Vec<RawOutViewRecord>,
    /// Non-blank rows after the header
    pub data_rows: usize,
    /// Rows dropped for a missing or malformed date
    pub dropped_rows: usize,
}

/// One cell of the OutView sheet, whichever format it came from.
#[derive(Debug, Clone, PartialEq)]
enum SheetCell {
    Empty,
    Text(String),
    Number(f64),
    Date(NaiveDate),
}

impl SheetCell {
    fn text(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            SheetCell::Empty
        } else {
            SheetCell::Text(trimmed.to_string())
        }
    }

    fn is_blank(&self) -> bool {
        matches!(self, SheetCell::Empty)
    }

    fn to_text(&self) -> String {
        match self {
            SheetCell::Empty => String::new(),
            SheetCell::Text(text) => text.clone(),
            SheetCell::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => {
                format!("{}", *n as i64)
            }
            SheetCell::Number(n) => n.to_string(),
            SheetCell::Date(date) => date.format("%d/%m/%Y").to_string(),
        }
    }
}

impl From<&Data> for SheetCell {
    fn from(data: &Data) -> Self {
        match data {
            Data::Empty => SheetCell::Empty,
            Data::String(s) | Data::DateTimeIso(s) => SheetCell::text(s),
            Data::Float(f) => SheetCell::Number(*f),
            Data::Int(i) => SheetCell::Number(*i as f64),
            Data::Bool(b) => SheetCell::Text(b.to_string()),
            Data::DateTime(dt) => {
                let serial = dt.as_f64();
                excel_serial_to_date(serial).map_or(SheetCell::Number(serial), SheetCell::Date)
            }
            _ => SheetCell::Empty,
        }
    }
}

/// Rows of the sheet with their 1-based source row number.
type Grid = Vec<(usize, Vec<SheetCell>)>;

fn is_workbook(bytes: &[u8]) -> bool {
    bytes.starts_with(ZIP_MAGIC) || bytes.starts_with(OLE_MAGIC)
}

fn read_workbook_grid(bytes: &[u8]) -> std::result::Result<Grid, FormatError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|e| FormatError::Spreadsheet(e.to_string()))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| FormatError::Spreadsheet("workbook contains no sheets".to_string()))?
        .map_err(|e| FormatError::Spreadsheet(e.to_string()))?;

    let (start_row, start_col) = range.start().unwrap_or((0, 0));
    let grid = range
        .rows()
        .enumerate()
        .map(|(idx, row)| {
            let mut cells = vec![SheetCell::Empty; start_col as usize];
            cells.extend(row.iter().map(SheetCell::from));
            (start_row as usize + idx + 1, cells)
        })
        .collect();
    Ok(grid)
}

/// Picks the delimiter that splits the sample lines most consistently.
fn sniff_delimiter(content: &str) -> u8 {
    let sample: Vec<&str> = content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .take(10)
        .collect();

    let mut best = b',';
    let mut best_score = 0usize;
    for delimiter in [b'\t', b';', b','] {
        let counts: Vec<usize> = sample
            .iter()
            .map(|line| line.split(delimiter as char).count())
            .collect();
        let Some(&target) = counts.first() else {
            continue;
        };
        if target <= 1 {
            continue;
        }
        let score = counts.iter().filter(|&&c| c == target).count() * target;
        if score > best_score {
            best_score = score;
            best = delimiter;
        }
    }
    best
}

fn read_delimited_grid(bytes: &[u8]) -> std::result::Result<Grid, FormatError> {
    let text = decode_text(bytes)?;
    let delimiter = sniff_delimiter(&text);
    debug!("OutView text export, delimiter {:?}", delimiter as char);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let mut grid = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let record = result.map_err(|e| FormatError::Undecodable(e.to_string()))?;
        let row = record
            .position()
            .map_or(idx + 1, |pos| pos.line() as usize);
        grid.push((row, record.iter().map(SheetCell::text).collect()));
    }
    Ok(grid)
}

struct OutViewLayout {
    date: usize,
    base_name: usize,
    tariff: usize,
    element_type: usize,
    medium: Option<usize>,
    provider: Option<usize>,
    provider_code: Option<usize>,
    district: Option<usize>,
    avenue: Option<usize>,
    street: Option<usize>,
    orientation: Option<usize>,
    sector: Option<usize>,
    category: Option<usize>,
    item: Option<usize>,
    brand: Option<usize>,
    product: Option<usize>,
    version: Option<usize>,
    agency: Option<usize>,
    advertiser: Option<usize>,
    region: Option<usize>,
    latitude: Option<usize>,
    longitude: Option<usize>,
}

impl OutViewLayout {
    fn resolve(index: &ColumnIndex) -> std::result::Result<Self, FormatError> {
        let mut missing = Vec::new();
        let date = index.require(&["FECHA"], &mut missing);
        let base_name = index.require(&["NOMBREBASE", "NOMBRE BASE"], &mut missing);
        let tariff = index.require(&["TARIFA S/.", "TARIFA S/", "TARIFA"], &mut missing);
        let element_type =
            index.require(&["TIPO ELEMENTO", "TIPO DE ELEMENTO"], &mut missing);
        if !missing.is_empty() {
            return Err(FormatError::MissingColumns(missing));
        }

        Ok(Self {
            date,
            base_name,
            tariff,
            element_type,
            medium: index.find(&["MEDIO"]),
            provider: index.find(&["PROVEEDOR"]),
            provider_code: index.find(&["COD.PROVEEDOR", "COD. PROVEEDOR", "CODIGO PROVEEDOR"]),
            district: index.find(&["DISTRITO"]),
            avenue: index.find(&["AVENIDA"]),
            street: index.find(&["NRO CALLE/CUADRA", "NRO CALLE", "CALLE"]),
            orientation: index.find(&["ORIENTACIÓN DE VÍA", "ORIENTACION DE VIA", "ORIENTACIÓN"]),
            sector: index.find(&["SECTOR"]),
            category: index.find(&["CATEGORÍA", "CATEGORIA"]),
            item: index.find(&["ITEM", "ÍTEM"]),
            brand: index.find(&["MARCA"]),
            product: index.find(&["PRODUCTO"]),
            version: index.find(&["VERSIÓN", "VERSION"]),
            agency: index.find(&["AGENCIA"]),
            advertiser: index.find(&["ANUNCIANTE"]),
            region: index.find(&["REGIÓN", "REGION"]),
            latitude: index.find(&["LATITUD"]),
            longitude: index.find(&["LONGITUD"]),
        })
    }

    fn consumed(&self) -> HashSet<usize> {
        [self.date, self.base_name, self.tariff, self.element_type]
            .into_iter()
            .chain(
                [
                    self.medium,
                    self.provider,
                    self.provider_code,
                    self.district,
                    self.avenue,
                    self.street,
                    self.orientation,
                    self.sector,
                    self.category,
                    self.item,
                    self.brand,
                    self.product,
                    self.version,
                    self.agency,
                    self.advertiser,
                    self.region,
                    self.latitude,
                    self.longitude,
                ]
                .into_iter()
                .flatten(),
            )
            .collect()
    }
}

fn cell(cells: &[SheetCell], idx: Option<usize>) -> &SheetCell {
    const EMPTY: &SheetCell = &SheetCell::Empty;
    idx.and_then(|i| cells.get(i)).unwrap_or(EMPTY)
}

/// Parses an OutView workbook (xlsx/xls/ods) or delimited text export.
pub fn parse_outview(bytes: &[u8], report: &mut QualityReport) -> Result<ParsedOutView> {
    read_outview(bytes, report)
        .map_err(|e| MediaSpendError::format(SourceKind::OutView.to_string(), e))
}

fn read_outview(
    bytes: &[u8],
    report: &mut QualityReport,
) -> std::result::Result<ParsedOutView, FormatError> {
    let grid = if is_workbook(bytes) {
        read_workbook_grid(bytes)?
    } else {
        read_delimited_grid(bytes)?
    };

    let mut rows = grid
        .into_iter()
        .filter(|(_, cells)| cells.iter().any(|c| !c.is_blank()));

    let (header_row, header) = rows.next().ok_or(FormatError::NoDataRows)?;
    let columns: Vec<String> = header.iter().map(|c| normalize_label(&c.to_text())).collect();
    info!("OutView header found on row {}", header_row);

    let index = ColumnIndex::new(&columns);
    let layout = OutViewLayout::resolve(&index)?;
    let consumed = layout.consumed();

    let mut parsed = ParsedOutView {
        columns: Vec::new(),
        records: Vec::new(),
        data_rows: 0,
        dropped_rows: 0,
    };

    for (row, cells) in rows {
        parsed.data_rows += 1;
        match build_outview_record(row, &cells, &layout, &columns, &consumed, report) {
            Some(record) => parsed.records.push(record),
            None => parsed.dropped_rows += 1,
        }
    }

    if parsed.data_rows == 0 {
        return Err(FormatError::NoDataRows);
    }
    if parsed.dropped_rows > 0 {
        warn!(
            "{} OutView rows dropped for a missing or invalid date",
            parsed.dropped_rows
        );
    }
    info!(
        "Parsed {} OutView rows ({} dropped)",
        parsed.records.len(),
        parsed.dropped_rows
    );

    parsed.columns = columns;
    Ok(parsed)
}

fn build_outview_record(
    row: usize,
    cells: &[SheetCell],
    layout: &OutViewLayout,
    columns: &[String],
    consumed: &HashSet<usize>,
    report: &mut QualityReport,
) -> Option<RawOutViewRecord> {
    let date_cell = cell(cells, Some(layout.date));
    let date = match date_cell {
        SheetCell::Date(date) => Some(*date),
        SheetCell::Number(serial) => excel_serial_to_date(*serial),
        SheetCell::Text(text) => parse_day_first_date(text),
        SheetCell::Empty => None,
    };
    let Some(date) = date else {
        report.push(DataQualityWarning::MalformedDate {
            source: SourceKind::OutView,
            row,
            value: date_cell.to_text(),
        });
        return None;
    };

    let tariff_cell = cell(cells, Some(layout.tariff));
    let tariff = match tariff_cell {
        SheetCell::Number(n) => Some(*n),
        SheetCell::Text(text) => parse_localized_number(text),
        SheetCell::Empty => Some(0.0),
        SheetCell::Date(_) => None,
    };
    let tariff = match tariff {
        Some(value) if value < 0.0 => {
            report.push(DataQualityWarning::NegativeAmount {
                source: SourceKind::OutView,
                row,
                column: "TARIFA S/.".to_string(),
                value,
            });
            0.0
        }
        Some(value) => value,
        None => {
            report.push(DataQualityWarning::MalformedNumber {
                source: SourceKind::OutView,
                row,
                column: "TARIFA S/.".to_string(),
                value: tariff_cell.to_text(),
            });
            0.0
        }
    };

    let mut coordinate = |idx: Option<usize>, column: &str| -> Option<f64> {
        match cell(cells, idx) {
            SheetCell::Number(n) => Some(*n),
            SheetCell::Empty => None,
            other => {
                let raw = other.to_text();
                let parsed = raw.replace(',', ".").parse::<f64>().ok();
                if parsed.is_none() {
                    report.push(DataQualityWarning::MalformedNumber {
                        source: SourceKind::OutView,
                        row,
                        column: column.to_string(),
                        value: raw,
                    });
                }
                parsed
            }
        }
    };
    let latitude = coordinate(layout.latitude, "LATITUD");
    let longitude = coordinate(layout.longitude, "LONGITUD");

    let text = |idx: Option<usize>| cell(cells, idx).to_text();
    let medium = match text(layout.medium) {
        raw if raw.is_empty() => Medium::ViaPublica,
        raw => Medium::parse(&raw),
    };

    Some(RawOutViewRecord {
        row,
        date,
        base_name: text(Some(layout.base_name)),
        medium,
        provider: text(layout.provider),
        provider_code: text(layout.provider_code),
        element_type: ElementType::parse(&text(Some(layout.element_type))),
        district: text(layout.district),
        avenue: text(layout.avenue),
        street: text(layout.street),
        orientation: text(layout.orientation),
        sector: text(layout.sector),
        category: text(layout.category),
        item: text(layout.item),
        brand: text(layout.brand),
        product: text(layout.product),
        version: text(layout.version),
        agency: text(layout.agency),
        advertiser: text(layout.advertiser),
        region: text(layout.region),
        latitude,
        longitude,
        tariff,
        extra: extra_columns(columns, consumed, |idx| {
            cells.get(idx).map(SheetCell::to_text)
        }),
    })
}
