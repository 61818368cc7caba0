mod driver;

pub use driver::{install_browsers, WebDriver, WebDriverConfig};
