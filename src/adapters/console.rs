use crate::domain::ports::InputSource;
use crate::utils::error::{ParkingError, Result};
use std::io::{BufRead, BufReader, Stdin};
use std::sync::{Arc, Mutex};

/// Line-oriented operator input. Clones read from the same stream.
#[derive(Debug)]
pub struct ConsoleInput<R: BufRead> {
    reader: Arc<Mutex<R>>,
    prompts: bool,
}

impl<R: BufRead> Clone for ConsoleInput<R> {
    fn clone(&self) -> Self {
        Self {
            reader: Arc::clone(&self.reader),
            prompts: self.prompts,
        }
    }
}

impl ConsoleInput<BufReader<Stdin>> {
    pub fn stdin() -> Self {
        Self::new(BufReader::new(std::io::stdin())).with_prompts(true)
    }
}

impl<R: BufRead> ConsoleInput<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: Arc::new(Mutex::new(reader)),
            prompts: false,
        }
    }

    pub fn with_prompts(mut self, prompts: bool) -> Self {
        self.prompts = prompts;
        self
    }

    fn prompt(&self, text: &str) {
        if self.prompts {
            println!("{}", text);
        }
    }

    fn read_line(&self) -> Result<String> {
        let mut reader = self.reader.lock().unwrap_or_else(|e| e.into_inner());
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 {
            return Err(ParkingError::IoError(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "operator input closed",
            )));
        }
        Ok(line.trim().to_string())
    }

    /// Reads a numeric code; anything that is not a number becomes 0, which no
    /// menu uses.
    pub fn read_code(&self) -> Result<u32> {
        let line = self.read_line()?;
        Ok(line.parse().unwrap_or_else(|_| {
            tracing::debug!(input = %line, "Unreadable code");
            0
        }))
    }
}

impl<R: BufRead + Send> InputSource for ConsoleInput<R> {
    fn read_vehicle_class_selection(&self) -> Result<u32> {
        self.prompt("Please select vehicle type from menu");
        self.prompt("1 CAR");
        self.prompt("2 BIKE");
        self.read_code()
    }

    fn read_registration_id(&self) -> Result<String> {
        self.prompt("Please type the vehicle registration number and press enter key");
        self.read_line()
    }
}
