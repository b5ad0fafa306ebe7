use std::io;
use std::path::Path;

use csv::{ReaderBuilder, Writer, WriterBuilder};

use crate::error::ExtractError;
use crate::model::{APPROVED_AMOUNT_HEADER, CLAIM_ID_HEADER, CleanedRecord};

fn write_records<W: io::Write>(
    writer: &mut Writer<W>,
    records: &[CleanedRecord],
) -> Result<(), ExtractError> {
    // Header goes out explicitly so an empty result still carries it.
    writer.write_record([CLAIM_ID_HEADER, APPROVED_AMOUNT_HEADER])?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_csv(path: &Path, records: &[CleanedRecord]) -> Result<(), ExtractError> {
    let mut writer = WriterBuilder::new().has_headers(false).from_path(path)?;
    write_records(&mut writer, records)
}

pub fn write_csv_to_string(records: &[CleanedRecord]) -> Result<String, ExtractError> {
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::<u8>::new());
    write_records(&mut writer, records)?;

    let bytes = writer
        .into_inner()
        .map_err(|error| ExtractError::Csv(error.into_error().into()))?;
    Ok(String::from_utf8(bytes)?)
}

pub fn read_csv<R: io::Read>(reader: R) -> Result<Vec<CleanedRecord>, ExtractError> {
    let mut reader = ReaderBuilder::new().has_headers(true).from_reader(reader);
    let records = reader
        .deserialize::<CleanedRecord>()
        .collect::<Result<Vec<_>, _>>()?;
    Ok(records)
}
