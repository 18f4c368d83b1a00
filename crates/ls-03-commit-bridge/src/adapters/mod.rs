pub mod in_process;
