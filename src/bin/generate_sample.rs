//! Generate a deterministic sample spreadsheet with the expected column
//! contract, including a few rows with broken coordinates to exercise the
//! cleaning step. Output: `sample_establecimientos.xlsx`.

use rust_xlsxwriter::{Workbook, XlsxError};

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    fn range(&mut self, lo: i64, hi: i64) -> i64 {
        lo + (self.next_u64() % (hi - lo + 1) as u64) as i64
    }
}

const COLUMNS: [&str; 15] = [
    "RBD", "NOM_RBD", "COD_DEPE", "COD_DEPE2", "CONVENIO_PIE", "PACE", "ENS_01", "ENS_02",
    "ENS_03", "ENS_04", "ENS_05", "ENS_06", "MAT_TOTAL", "LATITUD", "LONGITUD",
];

fn main() -> Result<(), XlsxError> {
    let mut rng = SimpleRng::new(42);

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();

    for (col, name) in COLUMNS.iter().enumerate() {
        sheet.write_string(0, col as u16, *name)?;
    }

    // 200 facilities scattered around Santiago (-33.45, -70.67).
    for i in 0..200u32 {
        let row = i + 1;
        let id = 1000 + i as i64;
        let has_pie = rng.next_f64() < 0.35;
        let has_pace = rng.next_f64() < 0.25;

        sheet.write_number(row, 0, id as f64)?;
        sheet.write_string(row, 1, format!("Escuela de Prueba {id}"))?;
        sheet.write_number(row, 2, rng.range(1, 4) as f64)?;
        sheet.write_number(row, 3, rng.range(1, 6) as f64)?;
        sheet.write_number(row, 4, if has_pie { 1.0 } else { 0.0 })?;
        sheet.write_number(row, 5, if has_pace { 1.0 } else { 0.0 })?;
        for level in 0..6u16 {
            let active = rng.next_f64() < 0.4;
            let code = (level as i64 + 1) * 100 + 10;
            sheet.write_string(row, 6 + level, if active { code.to_string() } else { "0".into() })?;
        }
        sheet.write_number(row, 12, rng.range(0, 2500) as f64)?;

        if i % 40 == 39 {
            // Broken coordinates: these rows must be dropped at ingestion.
            sheet.write_string(row, 13, "sin dato")?;
            sheet.write_string(row, 14, "")?;
        } else {
            sheet.write_number(row, 13, -33.45 + (rng.next_f64() - 0.5) * 0.4)?;
            sheet.write_number(row, 14, -70.67 + (rng.next_f64() - 0.5) * 0.4)?;
        }
    }

    workbook.save("sample_establecimientos.xlsx")?;
    println!("wrote sample_establecimientos.xlsx (200 rows, 5 with broken coordinates)");
    Ok(())
}
