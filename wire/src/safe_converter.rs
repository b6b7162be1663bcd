pub trait SafeCast<T> {
    fn safe_cast(self) -> T;
}

impl SafeCast<u64> for usize {
    fn safe_cast(self) -> u64 {
        self as u64
    }
}

/// For narrowing casts where business logic ensures that the value is in the narrower type's range.
/// NB: The implementations will panic otherwise
pub trait PrecheckedCast<T> {
    fn prechecked_cast(self) -> T;
}
impl PrecheckedCast<i32> for usize {
    fn prechecked_cast(self) -> i32 {
        self.try_into().expect("this is a bug: application logic should have ensured the value range")
    }
}
