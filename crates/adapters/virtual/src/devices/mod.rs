//! Virtual device implementations: lamp, sensor.

pub mod lamp;
pub mod sensor;

use homeport_domain::value::{CONTENT_TYPE, Value};

fn plain(text: impl Into<String>) -> Value {
    Value::text(text).with_header(CONTENT_TYPE, "text/plain")
}
