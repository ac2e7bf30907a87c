///
/// record!
///
/// Build a [`Record`](crate::value::Record) from `key => value` pairs.
/// Values go through `Value::from`.
///

#[macro_export]
macro_rules! record {
    () => {
        $crate::value::Record::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut record = $crate::value::Record::new();
        $(
            record.insert(::std::string::String::from($key), $crate::value::Value::from($value));
        )+
        record
    }};
}
