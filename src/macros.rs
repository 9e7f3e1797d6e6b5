#[macro_export]
macro_rules! json_value {
    ($($tt:tt)*) => {
        {
            ::std::convert::TryInto::try_into(::serde_json::json!($($tt)*))
                .unwrap_or($crate::codec::Value::Null)
        }
    };
}
