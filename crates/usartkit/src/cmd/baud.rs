use usartkit_line::baud::{DEFAULT_BAUD, DEFAULT_CLOCK_HZ};
use usartkit_line::{LineConfig, BAUD_TABLE};

use crate::cmd::BaudArgs;
use crate::exit::{line_error, CliResult, SUCCESS};
use crate::output::{print_divisors, DivisorRow, OutputFormat};

pub fn run(args: BaudArgs, format: OutputFormat) -> CliResult<i32> {
    if args.clock.is_none() && args.baud.is_none() {
        let rows: Vec<DivisorRow> = BAUD_TABLE
            .iter()
            .flat_map(DivisorRow::from_entry)
            .collect();
        print_divisors(&rows, format);
        return Ok(SUCCESS);
    }

    let row = check(
        args.clock.unwrap_or(DEFAULT_CLOCK_HZ),
        args.baud.unwrap_or(DEFAULT_BAUD),
        !args.normal_speed,
    )?;
    print_divisors(&[row], format);
    Ok(SUCCESS)
}

fn check(clock_hz: u32, baud: u32, double_speed: bool) -> CliResult<DivisorRow> {
    let config = LineConfig {
        clock_hz,
        baud,
        double_speed,
        ..LineConfig::default()
    };
    let ubrr = config
        .divisor()
        .map_err(|err| line_error("baud check failed", err))?;
    Ok(DivisorRow::new(clock_hz, baud, double_speed, ubrr))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exit::CONFIG;

    #[test]
    fn supported_combination() {
        let row = check(8_000_000, 115_200, false).expect("8 MHz / 115200 is in the table");
        assert_eq!(row.ubrr, 3);
        assert!(!row.double_speed);
    }

    #[test]
    fn unsupported_combination_is_config_error() {
        let err = check(1_000_000, 115_200, true).expect_err("not in the table");
        assert_eq!(err.code, CONFIG);
    }
}
