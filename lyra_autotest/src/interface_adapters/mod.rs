// Interface adapters: wire DTOs for the automation tool and run reports.

pub mod protocol;
