pub mod partition_store;

#[cfg(test)]
mod open_partition;
