//! Hardware smoke test: drives an HD44780 display through the character
//! device GPIO interface.
//!
//! Pin numbers come from the environment (or a `.env` file):
//! `CHARLCD_PIN_RS`, `CHARLCD_PIN_E`, `CHARLCD_PINS_DATA` (4 offsets,
//! D4..D7), optionally `CHARLCD_PIN_RW` (enables busy-flag timing and
//! readback) and `CHARLCD_GPIOCHIP` (defaults to `/dev/gpiochip0`).

use charlcd_bus::driver::{HD44780Driver, TransportHD44780Driver};
use charlcd_bus::{BusState, LcdError, LcdResult, LcdTransport};
use dotenv::dotenv;
use log::{debug, info};
use std::cell::RefCell;
use std::env::var;
use std::fmt::{Debug, Formatter};
use std::thread::sleep;
use std::time::{Duration, Instant};

/// [LcdTransport] over gpiod lines. The data lines are requested as outputs
/// while driven and dropped back to the kernel (floating) when the bus state
/// releases them or a read cycle needs the controller to drive them.
struct GpiodTransport {
    chip: gpiod::Chip,
    pin_rs: gpiod::Lines<gpiod::Output>,
    pin_rw: Option<gpiod::Lines<gpiod::Output>>,
    pin_e: gpiod::Lines<gpiod::Output>,
    data_offsets: [u32; 4],
    data_out: RefCell<Option<gpiod::Lines<gpiod::Output>>>,
}

impl GpiodTransport {
    fn new(
        chip: gpiod::Chip,
        pin_rs: u32,
        pin_rw: Option<u32>,
        pin_e: u32,
        data_offsets: [u32; 4],
    ) -> eyre::Result<Self> {
        let pin_rs = chip.request_lines(
            gpiod::Options::output([pin_rs]).consumer(env!("CARGO_PKG_NAME")),
        )?;
        let pin_rw = pin_rw
            .map(|offset| {
                chip.request_lines(
                    gpiod::Options::output([offset]).consumer(env!("CARGO_PKG_NAME")),
                )
            })
            .transpose()?;
        let pin_e = chip.request_lines(
            gpiod::Options::output([pin_e]).consumer(env!("CARGO_PKG_NAME")),
        )?;
        Ok(GpiodTransport {
            chip,
            pin_rs,
            pin_rw,
            pin_e,
            data_offsets,
            data_out: RefCell::new(None),
        })
    }
}

impl Debug for GpiodTransport {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "GpiodTransport({})", self.chip.name())
    }
}

impl LcdTransport for GpiodTransport {
    fn send(&self, state: &BusState) -> LcdResult<()> {
        self.pin_rs.set_values([state.register_select])?;
        if let Some(pin_rw) = &self.pin_rw {
            pin_rw.set_values([state.read])?;
        }
        match state.data {
            Some(nibble) => {
                let mut data_out = self.data_out.borrow_mut();
                if data_out.is_none() {
                    *data_out = Some(self.chip.request_lines(
                        gpiod::Options::output(self.data_offsets)
                            .consumer(env!("CARGO_PKG_NAME")),
                    )?);
                }
                let mut values = [false; 4];
                for (i, value) in values.iter_mut().enumerate() {
                    *value = nibble & (1 << i) != 0;
                }
                if let Some(lines) = data_out.as_ref() {
                    lines.set_values(values)?;
                }
            }
            None => {
                self.data_out.borrow_mut().take();
            }
        }
        // Enable goes last so its edge sees the settled lines
        self.pin_e.set_values([state.enable])?;
        Ok(())
    }

    fn recv(&self) -> LcdResult<u8> {
        if self.pin_rw.is_none() {
            return Err(LcdError::NotSupported);
        }
        self.data_out.borrow_mut().take();
        let input = self.chip.request_lines(
            gpiod::Options::input(self.data_offsets).consumer(env!("CARGO_PKG_NAME")),
        )?;
        let values = input.get_values([false; 4])?;
        let mut nibble = 0u8;
        for (i, &value) in values.iter().enumerate() {
            if value {
                nibble |= 1 << i;
            }
        }
        Ok(nibble)
    }

    fn delay(&self, duration: Duration) {
        // Scheduler sleep granularity is too coarse below a millisecond
        if duration < Duration::from_millis(1) {
            let start = Instant::now();
            while start.elapsed() < duration {
                std::hint::spin_loop();
            }
        } else {
            sleep(duration);
        }
    }
}

fn parse_pin_bus(pin_str: &str) -> eyre::Result<[u32; 4]> {
    pin_str
        .split([',', ' ', ';'])
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.parse())
        .collect::<Result<Vec<_>, _>>()?
        .try_into()
        .map_err(|_| eyre::eyre!("Invalid number of data pins"))
}

fn main() -> eyre::Result<()> {
    dotenv().ok();
    pretty_env_logger::init();

    let chip_path = var("CHARLCD_GPIOCHIP").unwrap_or_else(|_| "/dev/gpiochip0".to_string());
    let pin_rs_no: u32 = var("CHARLCD_PIN_RS")?.parse()?;
    let pin_e_no: u32 = var("CHARLCD_PIN_E")?.parse()?;
    let pin_rw_no: Option<u32> = var("CHARLCD_PIN_RW").ok().map(|s| s.parse()).transpose()?;
    let data_pin_nos: [u32; 4] = parse_pin_bus(&var("CHARLCD_PINS_DATA")?)?;

    info!(
        "LCD @ {} E: {}, RW: {:?}, RS: {}, Data: {:?}",
        chip_path, pin_e_no, pin_rw_no, pin_rs_no, data_pin_nos
    );

    debug!("Requesting GPIO lines...");
    let chip = gpiod::Chip::new(&chip_path)?;
    let transport = GpiodTransport::new(chip, pin_rs_no, pin_rw_no, pin_e_no, data_pin_nos)?;
    debug!("{:?} ready.", transport);

    // With an R/W line we can poll the busy flag; without one the bus is
    // write-only and we fall back to worst-case delays.
    let mut lcd = if pin_rw_no.is_some() {
        TransportHD44780Driver::new_busy_flag(&transport)
    } else {
        TransportHD44780Driver::new_fixed_delay(&transport)
    };

    info!("Initializing display ({:?})...", lcd.timing());
    lcd.init()?;

    let heart = [
        0b00000, 0b01010, 0b11111, 0b11111, 0b01110, 0b00100, 0b00000, 0b00000,
    ];
    lcd.define_char(0, &heart)?;

    lcd.write_str_at(0, 0, b"Hello,")?;
    lcd.write_str_at(1, 0, b"World!")?;
    lcd.write_str_at(1, 7, &[0])?;

    if lcd.supports_read() {
        let line = lcd.read_str_at(0, 0, 6)?;
        info!("Read back: {:?}", String::from_utf8_lossy(&line));
    }

    info!("Done.");
    Ok(())
}
