//
// regression_test.rs: Check tool behaviour all the way up to binary
// invocation, so coverage includes the CLI surface.
//

use std::fs::{self, create_dir_all, remove_dir_all};
use std::path::Path;

use anyhow::Result;
use test_bin::get_test_bin;

const DESIGN: &str = "
Name chipselect ;
Partno CS01 ;
Device g16v8as ;

Pin 1 = a ;
Pin 2 = b ;
Pin 12 = !y ;

y = a & b ;
";

fn ensure_dir_exists(name: &str) -> Result<()> {
    if Path::new(name).exists() {
        remove_dir_all(name)?;
    }
    create_dir_all(name)?;
    Ok(())
}

#[test]
fn binary_writes_jedec_next_to_input() -> Result<()> {
    ensure_dir_exists("test_temp_build")?;
    fs::write("test_temp_build/design.pld", DESIGN)?;

    let result = get_test_bin("cuprum")
        .current_dir("test_temp_build")
        .arg("design.pld")
        .output()?;
    assert!(
        result.status.success(),
        "stderr: {:?}",
        String::from_utf8_lossy(&result.stderr)
    );

    let jed = fs::read_to_string("test_temp_build/design.jed")?;
    assert!(jed.starts_with('\x02'));
    assert!(jed.contains("*QF2194\n"));
    assert!(jed.contains("*G0\n"));

    // The binary output matches the library pipeline byte for byte.
    let expected = cuprum::assemble(DESIGN, false, None)?;
    assert_eq!(jed, expected);

    remove_dir_all("test_temp_build")?;
    Ok(())
}

#[test]
fn binary_reports_errors_with_line_numbers() -> Result<()> {
    ensure_dir_exists("test_temp_fail")?;
    fs::write(
        "test_temp_fail/bad.pld",
        "Device g16v8 ;\nPin 1 = a ;\nPin 12 = y ;\ny = q ;\n",
    )?;

    let result = get_test_bin("cuprum")
        .current_dir("test_temp_fail")
        .arg("bad.pld")
        .output()?;
    assert!(!result.status.success());
    let stderr = String::from_utf8_lossy(&result.stderr);
    assert!(
        stderr.contains("Error in line 4: unknown symbol 'q'"),
        "stderr: {:?}",
        stderr
    );
    assert!(!Path::new("test_temp_fail/bad.jed").exists());

    remove_dir_all("test_temp_fail")?;
    Ok(())
}
