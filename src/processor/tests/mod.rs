//! Pipeline tests for the processor module
//!
//! Runs whole analyses over small log exports written to temp directories.

pub mod basic_processing;
pub mod error_handling;

use std::fs;
use std::path::{Path, PathBuf};

/// One raw log line with the given message code and payload body
pub fn log_line(timestamp: &str, message_code: &str, payload: &str) -> String {
    format!(
        "{ts};I;SORTER01;10.1.2.3;PLC01;0;0;{ts};MCC01;{code};1;->{{{payload}}}<\n",
        ts = timestamp,
        code = message_code,
        payload = payload
    )
}

/// Sort-outcome export: a recirculated package, a no-read, a two-attempt
/// package, plus one induction record that the sort family ignores
pub fn write_sort_log(dir: &Path) -> PathBuf {
    let contents = [
        log_line(
            "250924100000000",
            "54177",
            "itemID:A1,indexNo:0012,barcodeAWCS:BC1,requestedDestMCID:[3001],sortCode:[0]",
        ),
        log_line(
            "250924100500000",
            "54177",
            "itemID:A1,indexNo:0012,barcodeAWCS:BC1,requestedDestMCID:[1001],sortCode:[0]",
        ),
        log_line(
            "250924101000000",
            "54177",
            "itemID:B1,indexNo:0034,barcodeAWCS:????,requestedDestMCID:[1002],sortCode:[8]",
        ),
        log_line(
            "250924101500000",
            "54177",
            "itemID:C1,indexNo:0056,barcodeAWCS:9999,requestedDestMCID:[1001,1002],sortCode:[14,0]",
        ),
        log_line("250924102000000", "54123", "itemID:D1,inductionNo:0"),
    ]
    .concat();

    let path = dir.join("sorter.log");
    fs::write(&path, contents).unwrap();
    path
}

pub fn write_mapping(dir: &Path) -> PathBuf {
    let path = dir.join("TST1_Destination_Mapping.csv");
    fs::write(
        &path,
        "IndexNo,Amazon,Beumer,Jackpot\n1001,ARSC-1,CHU001,\n1002,ARSC-2,CHU002,Jackpot\n3001,RECIRC,CHU900,\n",
    )
    .unwrap();
    path
}

/// Items-inducted export: three items on induction 0 over one minute
pub fn write_induction_log(dir: &Path) -> PathBuf {
    let contents = [
        log_line("250924100000000", "54123", "itemID:I1,indexNo:1,inductionNo:0"),
        log_line("250924100030000", "54123", "itemID:I2,indexNo:2,inductionNo:0"),
        log_line("250924100100000", "54123", "itemID:I3,indexNo:3,inductionNo:0"),
    ]
    .concat();

    let path = dir.join("induction.csv");
    fs::write(&path, contents).unwrap();
    path
}

/// Destination-request export with one barcode requested twice
pub fn write_destination_log(dir: &Path) -> PathBuf {
    let contents = [
        log_line(
            "250924100000000",
            "54163",
            "itemID:R1,barcodeAWCS:X1,requestedDestMCID:[1001,1002],sortCode:[0,0]",
        ),
        log_line(
            "250924100010000",
            "54163",
            "itemID:R2,barcodeAWCS:X2,requestedDestMCID:[1002],sortCode:[0]",
        ),
        log_line(
            "250924100020000",
            "54163",
            "itemID:R1,barcodeAWCS:X1,requestedDestMCID:[1003],sortCode:[0]",
        ),
    ]
    .concat();

    let path = dir.join("requests.txt");
    fs::write(&path, contents).unwrap();
    path
}
