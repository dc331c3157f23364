pub(crate) mod fetch;
pub(crate) mod meta;
pub(crate) mod poll;
pub(crate) mod records;
pub(crate) mod shared;
